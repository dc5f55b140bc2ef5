//! Store API: transport abstraction, HTTP client and one-shot commands

mod chat;
pub mod client;
#[cfg(test)]
pub mod mock;

pub use chat::{format_line, health, read_messages, send_message, show_message};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Message;

/// Failures at the store boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, reset, DNS failure and the like.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Store answered with a non-success status.
    #[error("HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// Body was not the expected JSON.
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

/// Request/response access to the remote message store.
///
/// Every call is attempted exactly once. Retrying is the caller's decision.
#[async_trait]
pub trait Transport: Send + Sync {
    /// List the full message collection in store order.
    async fn fetch_all(&self) -> Result<Vec<Message>, TransportError>;

    /// Append one message. The store assigns its id and timestamp.
    async fn submit(&self, username: &str, text: &str) -> Result<Message, TransportError>;
}
