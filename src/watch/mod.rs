//! Line-mode session: prints messages as they arrive and sends stdin lines.
//!
//! Lighter than the TUI and friendly to pipes. The first line typed sets the
//! username when none was given on the command line.

use std::collections::HashSet;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use crate::api::client::ChatClient;
use crate::api::format_line;
use crate::config::Config;
use crate::engine::{Phase, Snapshot, SubmitOutcome, SyncEngine, SyncSettings};
use crate::models::MessageId;
use crate::session::Identity;

/// Turns successive engine snapshots into lines not printed before.
#[derive(Default)]
pub struct LinePrinter {
    seen: HashSet<MessageId>,
    announced_empty: bool,
    last_error: Option<String>,
}

impl LinePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print for this snapshot: unseen messages in view order, plus
    /// status changes (empty store, refresh failing, refresh recovered).
    pub fn new_lines(&mut self, snapshot: &Snapshot, identity: &Identity) -> Vec<String> {
        let mut lines = Vec::new();

        if snapshot.phase == Phase::Loading {
            return lines;
        }

        if snapshot.last_error != self.last_error {
            match &snapshot.last_error {
                Some(err) => lines.push(format!("! refresh failed: {}", err)),
                None => lines.push("! refresh recovered".to_string()),
            }
            self.last_error = snapshot.last_error.clone();
        }

        if snapshot.messages.is_empty() && self.seen.is_empty() && !self.announced_empty {
            self.announced_empty = true;
            lines.push("(no messages yet)".to_string());
        }

        for msg in &snapshot.messages {
            if self.seen.insert(msg.id) {
                lines.push(format_line(msg, identity.owns(msg)));
            }
        }

        lines
    }
}

/// Run a line-mode session until Ctrl-C.
pub async fn run(config: &Config, user: Option<&str>) -> Result<()> {
    let identity = Identity::new();
    if let Some(name) = user {
        identity.set(name);
    }

    let client = ChatClient::new(config)?;
    let engine = SyncEngine::new(client, identity.clone(), SyncSettings::from(config));
    let mut updates = WatchStream::new(engine.subscribe());
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut printer = LinePrinter::new();

    engine.start();
    println!("Watching {} (Ctrl-C to stop)", config.base_url);
    if !identity.is_set() {
        println!("Enter your name:");
    }

    loop {
        tokio::select! {
            Some(_) = updates.next() => {
                for line in printer.new_lines(&engine.snapshot(), &identity) {
                    println!("{}", line);
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(text)) => handle_input(&engine, &identity, text),
                Ok(None) => {
                    tracing::debug!("stdin closed, watching only");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }
    }

    engine.stop().await;
    Ok(())
}

fn handle_input(engine: &SyncEngine<ChatClient>, identity: &Identity, text: String) {
    if !identity.is_set() {
        if identity.set(&text) {
            println!("You are {}. Type a message and press Enter.", identity.get());
        } else {
            println!("Enter your name:");
        }
        return;
    }

    let engine = engine.clone();
    tokio::spawn(async move {
        if engine.submit(&text).await == SubmitOutcome::Failed {
            println!("! message not sent");
        }
    });
}
