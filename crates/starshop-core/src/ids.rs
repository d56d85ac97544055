//! Identifier types for starshop.
//!
//! This module provides strongly-typed identifiers for users, pending requests,
//! and ledger entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Length of a request or order code.
pub const REQUEST_CODE_LEN: usize = 12;

/// A chat-platform user identifier.
///
/// Serialized as a bare integer, and as text when used as a document map key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Create a `UserId` from the platform's numeric id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Return the numeric id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| IdError::InvalidUserId)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A code identifying a pending topup request or purchase order.
///
/// Codes are twelve uppercase ASCII alphanumerics. Admins type them back into
/// the bot, so parsing is case-insensitive.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestCode(String);

impl RequestCode {
    /// Generate a fresh random code.
    ///
    /// Uniqueness against previously issued codes is the caller's concern; see
    /// [`crate::CodeBook`].
    #[must_use]
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        Self(simple[..REQUEST_CODE_LEN].to_ascii_uppercase())
    }

    /// Return the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RequestCode {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != REQUEST_CODE_LEN || !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(IdError::InvalidRequestCode);
        }
        Ok(Self(s.to_ascii_uppercase()))
    }
}

impl fmt::Debug for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestCode({})", self.0)
    }
}

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RequestCode {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RequestCode> for String {
    fn from(code: RequestCode) -> Self {
        code.0
    }
}

/// A ledger entry identifier using ULID for time-ordering.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryId(Ulid);

impl EntryId {
    /// Generate a new `EntryId` with the current timestamp.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Return the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> &Ulid {
        &self.0
    }
}

impl FromStr for EntryId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
        Ok(Self(ulid))
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for EntryId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntryId> for String {
    fn from(id: EntryId) -> Self {
        id.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a numeric user id.
    #[error("invalid user id")]
    InvalidUserId,

    /// The input is not a well-formed request code.
    #[error("invalid request code")]
    InvalidRequestCode,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn generated_code_is_well_formed() {
        let code = RequestCode::generate();
        assert_eq!(code.as_str().len(), REQUEST_CODE_LEN);
        assert!(code.as_str().bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        assert_eq!(code.as_str().parse::<RequestCode>().unwrap(), code);
    }

    #[test]
    fn code_parsing_normalizes_case() {
        let code: RequestCode = " ab12cd34ef56 ".parse().unwrap();
        assert_eq!(code.as_str(), "AB12CD34EF56");
    }

    #[test]
    fn code_parsing_rejects_bad_input() {
        assert!("short".parse::<RequestCode>().is_err());
        assert!("AB12CD34EF56X".parse::<RequestCode>().is_err());
        assert!("AB12-D34EF56".parse::<RequestCode>().is_err());
    }

    #[test]
    fn user_id_is_a_text_key_in_maps() {
        let mut map = BTreeMap::new();
        map.insert(UserId::new(42), 7_i64);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"42":7}"#);

        let parsed: BTreeMap<UserId, i64> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[&UserId::new(42)], 7);
    }

    #[test]
    fn user_id_parses_from_text() {
        assert_eq!("  1001".parse::<UserId>().unwrap(), UserId::new(1001));
        assert_eq!("abc".parse::<UserId>(), Err(IdError::InvalidUserId));
    }

    #[test]
    fn entry_id_serde_json() {
        let id = EntryId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: EntryId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
