//! HTTP client for the message store
//!
//! Wraps reqwest::Client with the store's URL layout and maps every failure
//! onto `TransportError`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use super::{Transport, TransportError};
use crate::config::Config;
use crate::models::{Health, Message, MessageId, NewMessage};

/// Store client speaking JSON over HTTP.
pub struct ChatClient {
    http: reqwest::Client,
    base: Url,
}

impl ChatClient {
    /// Build a client for the configured base URL and request timeout.
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        Self::with_base(&config.base_url, config.request_timeout())
    }

    pub fn with_base(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base = Url::parse(base_url)
            .map_err(|_| TransportError::InvalidBaseUrl(base_url.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| TransportError::Network {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self { http, base })
    }

    /// `<base>/messages`
    pub fn messages_url(&self) -> String {
        format!("{}/messages", self.base.as_str().trim_end_matches('/'))
    }

    /// `<base>/messages/{id}`
    fn message_url(&self, id: MessageId) -> String {
        format!("{}/{}", self.messages_url(), id)
    }

    /// Health endpoint sits at the origin root, outside the API prefix.
    pub fn health_url(&self) -> String {
        let mut url = self.base.clone();
        url.set_path("/health");
        url.set_query(None);
        url.to_string()
    }

    /// GET a single message by id.
    pub async fn fetch_one(&self, id: MessageId) -> Result<Message, TransportError> {
        let url = self.message_url(id);
        tracing::debug!("Store GET {}", url);
        let resp = self.http.get(&url).send().await;
        decode(resp, &url).await
    }

    /// Probe the store's health endpoint.
    pub async fn health(&self) -> Result<Health, TransportError> {
        let url = self.health_url();
        tracing::debug!("Store GET {}", url);
        let resp = self.http.get(&url).send().await;
        decode(resp, &url).await
    }
}

#[async_trait]
impl Transport for ChatClient {
    async fn fetch_all(&self) -> Result<Vec<Message>, TransportError> {
        let url = self.messages_url();
        tracing::debug!("Store GET {}", url);
        let resp = self.http.get(&url).send().await;
        decode(resp, &url).await
    }

    async fn submit(&self, username: &str, text: &str) -> Result<Message, TransportError> {
        let url = self.messages_url();
        let body = NewMessage {
            username: username.to_string(),
            text: text.to_string(),
        };
        tracing::debug!("Store POST {}", url);
        let resp = self.http.post(&url).json(&body).send().await;
        decode(resp, &url).await
    }
}

/// Check the status and parse the JSON body of a store response.
async fn decode<T: DeserializeOwned>(
    resp: Result<reqwest::Response, reqwest::Error>,
    url: &str,
) -> Result<T, TransportError> {
    let resp = resp.map_err(|e| network_error(e, url))?;
    let status = resp.status();
    let body = resp.text().await.map_err(|e| network_error(e, url))?;

    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body: body.trim().to_string(),
        });
    }

    serde_json::from_str(&body).map_err(|source| TransportError::Decode {
        url: url.to_string(),
        source,
    })
}

fn network_error(source: reqwest::Error, url: &str) -> TransportError {
    if source.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network {
            url: url.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ChatClient {
        ChatClient::with_base(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_messages_url() {
        assert_eq!(
            client("http://localhost:8080/api").messages_url(),
            "http://localhost:8080/api/messages"
        );
        assert_eq!(
            client("http://localhost:8080/api/").messages_url(),
            "http://localhost:8080/api/messages"
        );
    }

    #[test]
    fn test_message_url() {
        let c = client("https://chat.example.com/api");
        assert_eq!(
            c.message_url(MessageId(42)),
            "https://chat.example.com/api/messages/42"
        );
    }

    #[test]
    fn test_health_url_uses_origin() {
        assert_eq!(
            client("http://localhost:8080/api").health_url(),
            "http://localhost:8080/health"
        );
    }

    #[test]
    fn test_rejects_invalid_base() {
        assert!(matches!(
            ChatClient::with_base("localhost", Duration::from_secs(1)),
            Err(TransportError::InvalidBaseUrl(_))
        ));
    }
}
