//! # Expeta Realtime
//!
//! Realtime channel for Expeta 2.0 - carries conversation messages and code
//! generation progress from the backend to the application over a single
//! WebSocket connection.
//!
//! ## Features
//!
//! - **One connection**: concurrent connect calls share a single attempt
//! - **Multiplexed topics**: `conversation:<id>` and `generation:<id>` streams
//! - **Resilience**: heartbeat, exponential backoff and subscription replay
//! - **Isolation**: a panicking listener never disturbs the others
//!
//! ## Modules
//!
//! - [`realtime`]: Channel manager, transport and wire format
//! - [`config`]: TOML configuration with environment overrides

pub mod config;
pub mod realtime;

pub use realtime::{
    ChannelManager, Connection, ConnectionState, Connector, InboundMessage, ListenerHandle,
    OutboundMessage, RealtimeError, RealtimeResult, ReconnectPolicy, Subscription, Transport,
    WsConnector,
};

pub use config::{Config, ConfigError, LoggingConfig, RealtimeConfig};
