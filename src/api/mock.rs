//! Mock store transport for testing.
//!
//! Behaves like a tiny in-memory store by default. Individual fetches can be
//! failed or held behind a oneshot gate so tests control exactly when (and
//! with what) they resolve.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{Transport, TransportError};
use crate::models::{Message, MessageId, NewMessage};

pub type FetchResult = Result<Vec<Message>, TransportError>;

/// Timestamp stamped on messages created through the mock.
pub const MOCK_TIMESTAMP: &str = "2024-05-01T10:30:00Z";

/// Build a message with the mock timestamp.
pub fn message(id: u64, username: &str, text: &str) -> Message {
    Message {
        id: MessageId(id),
        username: username.to_string(),
        text: text.to_string(),
        timestamp: MOCK_TIMESTAMP.to_string(),
    }
}

/// Mock transport for testing.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Debug, Default)]
struct MockInner {
    messages: Vec<Message>,
    fetch_calls: usize,
    submitted: Vec<NewMessage>,
    fail_fetches: usize,
    fail_next_submit: bool,
    held_fetches: VecDeque<oneshot::Receiver<FetchResult>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given collection already in the store.
    pub fn with_messages(messages: Vec<Message>) -> Self {
        let mock = Self::new();
        mock.set_messages(messages);
        mock
    }

    /// Replace the stored collection.
    pub fn set_messages(&self, messages: Vec<Message>) {
        self.inner.lock().unwrap().messages = messages;
    }

    /// Number of `fetch_all` calls so far.
    pub fn fetch_calls(&self) -> usize {
        self.inner.lock().unwrap().fetch_calls
    }

    /// Every write the store received, in order.
    pub fn submitted(&self) -> Vec<NewMessage> {
        self.inner.lock().unwrap().submitted.clone()
    }

    /// Cause the next `fetch_all()` to fail with a 503.
    pub fn fail_next_fetch(&self) {
        self.inner.lock().unwrap().fail_fetches += 1;
    }

    /// Cause the next `submit()` to fail with a 500.
    pub fn fail_next_submit(&self) {
        self.inner.lock().unwrap().fail_next_submit = true;
    }

    /// Hold the next un-gated `fetch_all()` until the returned sender fires.
    ///
    /// Dropping the sender resolves the fetch with `TransportError::Timeout`.
    pub fn hold_next_fetch(&self) -> oneshot::Sender<FetchResult> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().unwrap().held_fetches.push_back(rx);
        tx
    }
}

fn unavailable(status: u16) -> TransportError {
    TransportError::Status {
        status,
        url: "mock://store/messages".to_string(),
        body: "unavailable".to_string(),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_all(&self) -> FetchResult {
        let held = {
            let mut inner = self.inner.lock().unwrap();
            inner.fetch_calls += 1;

            if inner.fail_fetches > 0 {
                inner.fail_fetches -= 1;
                return Err(unavailable(503));
            }

            match inner.held_fetches.pop_front() {
                Some(rx) => rx,
                None => return Ok(inner.messages.clone()),
            }
        };

        held.await.unwrap_or(Err(TransportError::Timeout))
    }

    async fn submit(&self, username: &str, text: &str) -> Result<Message, TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.fail_next_submit {
            inner.fail_next_submit = false;
            return Err(unavailable(500));
        }

        inner.submitted.push(NewMessage {
            username: username.to_string(),
            text: text.to_string(),
        });

        let next_id = inner.messages.iter().map(|m| m.id.0).max().unwrap_or(0) + 1;
        let created = message(next_id, username, text);
        inner.messages.push(created.clone());
        Ok(created)
    }
}
