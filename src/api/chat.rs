//! One-shot store commands for the CLI (print to stdout)

use anyhow::{bail, Context, Result};

use super::client::ChatClient;
use super::Transport;
use crate::config::Config;
use crate::engine::{SubmitOutcome, SyncEngine, SyncSettings};
use crate::models::{Message, MessageId};
use crate::session::Identity;

/// One display line: `[HH:MM] name: text`, with own messages tagged.
pub fn format_line(msg: &Message, own: bool) -> String {
    let who = if own {
        format!("{} (you)", msg.username)
    } else {
        msg.username.clone()
    };
    format!("[{}] {}: {}", msg.display_time(), who, msg.text)
}

/// Fetch the collection once and print the last `limit` messages.
pub async fn read_messages(config: &Config, limit: usize, user: Option<&str>) -> Result<()> {
    let client = ChatClient::new(config)?;
    let identity = Identity::new();
    if let Some(name) = user {
        identity.set(name);
    }

    let messages = client
        .fetch_all()
        .await
        .context("Failed to fetch messages")?;

    if messages.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    let skip = messages.len().saturating_sub(limit);
    for msg in &messages[skip..] {
        println!("{}", format_line(msg, identity.owns(msg)));
    }

    Ok(())
}

/// Send one message as `user`, then refresh once to confirm it landed.
pub async fn send_message(config: &Config, user: &str, text: &str) -> Result<()> {
    let client = ChatClient::new(config)?;
    let identity = Identity::new();
    if !identity.set(user) {
        bail!("Username must not be empty");
    }

    let engine = SyncEngine::new(client, identity, SyncSettings::from(config));
    match engine.submit(text).await {
        SubmitOutcome::Sent => {}
        SubmitOutcome::Rejected => bail!("Nothing to send: message text is empty"),
        SubmitOutcome::Failed => bail!("Failed to send message to {}", config.base_url),
    }

    let own = engine
        .messages()
        .iter()
        .filter(|m| engine.is_own(m))
        .count();
    println!("Message sent. {} message(s) from {} in the store.", own, user);
    Ok(())
}

/// Print a single message by id.
pub async fn show_message(config: &Config, id: u64) -> Result<()> {
    let client = ChatClient::new(config)?;
    let msg = client
        .fetch_one(MessageId(id))
        .await
        .with_context(|| format!("Failed to fetch message {}", id))?;

    println!("ID:   {}", msg.id);
    println!("From: {}", msg.username);
    println!("Time: {} ({})", msg.display_time(), msg.timestamp);
    println!();
    println!("{}", msg.text);
    Ok(())
}

/// Probe the store's health endpoint.
pub async fn health(config: &Config) -> Result<()> {
    let client = ChatClient::new(config)?;
    let url = client.health_url();
    let health = client
        .health()
        .await
        .with_context(|| format!("Store at {} is not reachable", url))?;

    println!("Store: {}", config.base_url);
    println!("Health: {}", health.status);
    Ok(())
}
