//! Collision-checked issuing of request and order codes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::RequestCode;

/// Category of code. Each category has its own namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    /// Topup requests (gateway and manual-transfer rails).
    Topup,
    /// Purchase orders (manual and automatic fulfillment).
    Order,
}

/// The set of codes ever issued in one category.
///
/// Seeded at startup with every code found in persisted records, so a code is
/// never handed out twice for the lifetime of the store.
#[derive(Debug, Clone)]
pub struct CodeBook {
    kind: CodeKind,
    used: HashSet<RequestCode>,
}

impl CodeBook {
    /// Create an empty code book for a category.
    #[must_use]
    pub fn new(kind: CodeKind) -> Self {
        Self {
            kind,
            used: HashSet::new(),
        }
    }

    /// The category this book issues codes for.
    #[must_use]
    pub const fn kind(&self) -> CodeKind {
        self.kind
    }

    /// Whether the code has been issued or seeded.
    #[must_use]
    pub fn contains(&self, code: &RequestCode) -> bool {
        self.used.contains(code)
    }

    /// Number of codes issued or seeded so far.
    #[must_use]
    pub fn known(&self) -> usize {
        self.used.len()
    }

    /// Issue a code that has never been used in this category.
    pub fn issue(&mut self) -> RequestCode {
        loop {
            let code = RequestCode::generate();
            if self.used.insert(code.clone()) {
                return code;
            }
        }
    }
}

impl Extend<RequestCode> for CodeBook {
    fn extend<T: IntoIterator<Item = RequestCode>>(&mut self, iter: T) {
        self.used.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_codes_never_repeat() {
        let mut book = CodeBook::new(CodeKind::Order);
        let codes: HashSet<_> = (0..2_000).map(|_| book.issue()).collect();
        assert_eq!(codes.len(), 2_000);
        assert_eq!(book.known(), 2_000);
    }

    #[test]
    fn seeded_codes_are_excluded() {
        let seeded: RequestCode = "AAAAAAAAAAAA".parse().unwrap();
        let mut book = CodeBook::new(CodeKind::Topup);
        book.extend([seeded.clone()]);

        assert!(book.contains(&seeded));
        assert_eq!(book.kind(), CodeKind::Topup);
        for _ in 0..500 {
            assert_ne!(book.issue(), seeded);
        }
    }
}
