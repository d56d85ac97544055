//! Per-user conversation state.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use starshop_core::{Session, UserId};

/// Sessions of every user, in memory only.
#[derive(Debug, Default)]
pub struct Sessions {
    inner: Mutex<HashMap<UserId, Session>>,
}

impl Sessions {
    /// Run `f` on the user's session, creating it if needed.
    ///
    /// The lock is never held across an await point.
    pub fn with<R>(&self, user_id: UserId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(sessions.entry(user_id).or_default())
    }
}
