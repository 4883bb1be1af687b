//! Expeta Realtime CLI
//!
//! Command-line client for the Expeta realtime channel:
//! - Listen to conversation and generation topics
//! - Send a single application payload
//! - Write a default configuration file
//!
//! # Configuration
//!
//! Settings come from `--config`, or the default locations, overridden by
//! `EXPETA_*` environment variables and finally by `--url`.
//! `RUST_LOG` takes precedence over the configured log level.

use anyhow::Context;
use clap::{Parser, Subcommand};
use expeta_realtime::config::generate_default_config;
use expeta_realtime::realtime::{EVENT_CLOSE, EVENT_MESSAGE, EVENT_RECONNECT_FAILED};
use expeta_realtime::{ChannelManager, Config, LoggingConfig};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "expeta-realtime")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Realtime channel client for Expeta 2.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir, then ./expeta.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// WebSocket endpoint, overrides the config file
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Auth token appended to the endpoint URL
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Output format for payloads (pretty, json)
    #[arg(short, long, default_value = "pretty", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe to topics and print every inbound payload
    Listen {
        /// Conversation ids to follow
        #[arg(long = "conversation")]
        conversations: Vec<String>,
        /// Generation ids to follow
        #[arg(long = "generation")]
        generations: Vec<String>,
        /// Raw topic names
        #[arg(long = "topic")]
        topics: Vec<String>,
    },

    /// Send one JSON payload
    Send {
        /// Payload, e.g. '{"type":"message","text":"hi"}'
        payload: String,
    },

    /// Write a default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_config(output.as_ref());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(url) = &cli.url {
        config.realtime.url = url.clone();
    }

    init_tracing(&config.logging);
    tracing::debug!(url = %config.realtime.url, "Using realtime endpoint");

    let manager = ChannelManager::new(config.realtime);
    let token = cli.token.clone().unwrap_or_default();

    match cli.command {
        Commands::Listen {
            conversations,
            generations,
            topics,
        } => listen(&manager, token, &cli.format, conversations, generations, topics).await,
        Commands::Send { payload } => {
            let payload: Value =
                serde_json::from_str(&payload).context("payload is not valid JSON")?;
            manager.connect(token).await?;
            manager.send(&payload).await?;
            tracing::info!("Payload sent");
            manager.disconnect();
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let json = logging.format == "json";

    // Payloads own stdout
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn write_config(output: Option<&PathBuf>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Config written to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

async fn listen(
    manager: &ChannelManager,
    token: String,
    format: &str,
    conversations: Vec<String>,
    generations: Vec<String>,
    topics: Vec<String>,
) -> anyhow::Result<()> {
    let pretty = format != "json";
    let _printer = manager.add_event_listener(EVENT_MESSAGE, move |payload| {
        print_payload(payload, pretty);
    });
    let _closed = manager.add_event_listener(EVENT_CLOSE, |event| {
        tracing::warn!(reason = %event["reason"], "Channel closed");
    });

    let gave_up = Arc::new(Notify::new());
    let notify = Arc::clone(&gave_up);
    let _failed = manager.add_event_listener(EVENT_RECONNECT_FAILED, move |_| {
        notify.notify_one();
    });

    let connection = manager.connect(token).await?;
    tracing::info!(connection_id = %connection.id, "Listening");

    let mut subscriptions = Vec::new();
    for id in &conversations {
        subscriptions.push(manager.subscribe_to_conversation(id, log_delivery));
    }
    for id in &generations {
        subscriptions.push(manager.subscribe_to_generation(id, log_delivery));
    }
    for topic in topics {
        subscriptions.push(manager.subscribe(topic, log_delivery));
    }
    if subscriptions.is_empty() {
        tracing::warn!("No topics given, only unaddressed payloads will arrive");
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            tracing::info!("Shutting down");
            manager.disconnect();
            Ok(())
        }
        _ = gave_up.notified() => {
            anyhow::bail!("realtime connection could not be re-established")
        }
    }
}

fn log_delivery(payload: &Value) {
    tracing::debug!(topic = %payload["subscriptionId"], "Topic payload delivered");
}

fn print_payload(payload: &Value, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(payload)
    } else {
        serde_json::to_string(payload)
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::warn!(error = %e, "Failed to render payload"),
    }
}
