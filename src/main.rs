//! pollchat - lightweight polling chat client
//!
//! Mirrors a remote message store by polling it, and posts messages under a
//! session-only username.

mod api;
mod config;
mod engine;
mod models;
mod session;
mod tui;
mod watch;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use tui::log_capture::LogBuffer;

#[derive(Parser)]
#[command(name = "pollchat")]
#[command(about = "Lightweight polling chat client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Store API base URL for this run (overrides config)
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the terminal user interface
    Tui {
        /// Username for this session (prompted if omitted)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Print messages as they arrive; lines typed on stdin are sent
    Watch {
        /// Username for this session (first stdin line if omitted)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Fetch the message list once
    Read {
        /// Maximum number of messages to show (newest last)
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Mark messages from this username as yours
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Send a message
    Send {
        /// Username to post as
        #[arg(short, long)]
        user: String,

        /// Message content
        message: String,
    },

    /// Show a single message by id
    Show {
        /// Message id (from `read` output)
        id: u64,
    },

    /// Check that the store is reachable
    Health,

    /// Show or update saved settings
    Config {
        /// Store API base URL
        #[arg(long = "set-base-url")]
        set_base_url: Option<String>,

        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging. The TUI owns the terminal, so its logs go to the
    // in-app debug pane instead of stderr.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let log_buffer = LogBuffer::new();
    if matches!(cli.command, Commands::Tui { .. }) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(log_buffer.clone()),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    let mut config = Config::load()?;
    if let Some(ref url) = cli.base_url {
        config.base_url = url.clone();
        config.validate()?;
    }

    match cli.command {
        Commands::Tui { user } => {
            tui::run(&config, user.as_deref(), log_buffer).await?;
        }
        Commands::Watch { user } => {
            watch::run(&config, user.as_deref()).await?;
        }
        Commands::Read { limit, user } => {
            api::read_messages(&config, limit, user.as_deref()).await?;
        }
        Commands::Send { user, message } => {
            tracing::info!("Sending message...");
            api::send_message(&config, &user, &message).await?;
        }
        Commands::Show { id } => {
            api::show_message(&config, id).await?;
        }
        Commands::Health => {
            api::health(&config).await?;
        }
        Commands::Config {
            set_base_url,
            interval_ms,
            timeout_secs,
        } => {
            update_config(set_base_url, interval_ms, timeout_secs)?;
        }
    }

    Ok(())
}

/// Apply any given settings and save, then print the effective config.
fn update_config(
    base_url: Option<String>,
    interval_ms: Option<u64>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let mut config = Config::load()?;
    let changed = base_url.is_some() || interval_ms.is_some() || timeout_secs.is_some();

    if let Some(url) = base_url {
        config.base_url = url;
    }
    if let Some(ms) = interval_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(secs) = timeout_secs {
        config.request_timeout_secs = secs;
    }

    if changed {
        config.save()?;
        println!("Saved {}", Config::config_path()?.display());
    }

    println!("base_url             = {}", config.base_url);
    println!("poll_interval_ms     = {}", config.poll_interval_ms);
    println!("request_timeout_secs = {}", config.request_timeout_secs);
    Ok(())
}
