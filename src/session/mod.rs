//! Session-scoped chat identity
//!
//! The username is a local tag, not an account: it is chosen once per
//! session, never persisted, and only used to decide which messages are
//! "mine" by exact string comparison.

use std::sync::{Arc, RwLock};

use crate::models::Message;

/// Shared handle to the current session's username.
///
/// Clones share the same underlying value, so the sync engine and the
/// presentation layer always agree on who "me" is.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    name: Arc<RwLock<String>>,
}

impl Identity {
    /// Create an identity with no username set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current username; empty when unset.
    pub fn get(&self) -> String {
        self.name.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether a username has been chosen.
    pub fn is_set(&self) -> bool {
        !self.name.read().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    /// Store the trimmed candidate. Empty or whitespace-only input is ignored.
    ///
    /// Returns whether the name was accepted.
    pub fn set(&self, candidate: &str) -> bool {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return false;
        }
        *self.name.write().unwrap_or_else(|e| e.into_inner()) = trimmed.to_string();
        tracing::info!("Chatting as {}", trimmed);
        true
    }

    /// Exact, case-sensitive match against the message author.
    pub fn owns(&self, message: &Message) -> bool {
        let name = self.name.read().unwrap_or_else(|e| e.into_inner());
        message.username == *name
    }
}
