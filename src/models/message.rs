//! Message-related models

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Store-assigned message identifier.
///
/// Opaque to the client: only compared for equality and printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat message as returned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub username: String,
    pub text: String,
    /// Store-defined point in time (RFC 3339 from the reference store).
    pub timestamp: String,
}

impl Message {
    /// Local `HH:MM` for display, or the raw timestamp if it does not parse.
    pub fn display_time(&self) -> String {
        format_time(&self.timestamp)
    }
}

/// Body of a write request. The store assigns `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub username: String,
    pub text: String,
}

/// Store health probe response
#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
}

/// Format an RFC 3339 timestamp as local hours and minutes.
pub fn format_time(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(dt) => dt.with_timezone(&Local).format("%H:%M").to_string(),
        Err(_) => timestamp.to_string(),
    }
}
