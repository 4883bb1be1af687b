//! Realtime Channel
//!
//! Reconnecting WebSocket client that pushes conversation and generation
//! updates from the Expeta backend to the application.
//!
//! ## Architecture
//!
//! - **ChannelManager**: Owns the single connection, subscriptions and listeners
//! - **Transport**: `Connector` seam with a tokio-tungstenite implementation
//! - **Messages**: Wire envelopes and event names
//! - **Registry**: Listener and subscription bookkeeping
//! - **Backoff**: Reconnect delay policy
//!
//! ## Usage
//!
//! ```rust,no_run
//! use expeta_realtime::{ChannelManager, RealtimeConfig};
//!
//! # async fn example() -> Result<(), expeta_realtime::RealtimeError> {
//! let manager = ChannelManager::new(RealtimeConfig::with_url("wss://api.expeta.dev/ws"));
//! manager.connect("session-token").await?;
//!
//! let updates = manager.subscribe_to_conversation("c1", |payload| {
//!     println!("conversation update: {}", payload);
//! });
//!
//! let lost = manager.add_event_listener("reconnectFailed", |_| {
//!     eprintln!("realtime connection lost for good");
//! });
//!
//! manager.send(&serde_json::json!({"type": "message", "text": "hi"})).await?;
//!
//! updates.unsubscribe();
//! lost.remove();
//! manager.disconnect();
//! # Ok(())
//! # }
//! ```

mod backoff;
mod error;
mod manager;
mod messages;
#[cfg(test)]
pub(crate) mod mock;
mod registry;
mod transport;

pub use backoff::ReconnectPolicy;
pub use error::{RealtimeError, RealtimeResult};
pub use manager::{ChannelManager, Connection, ConnectionState, ListenerHandle, Subscription};
pub use messages::{
    conversation_topic, generation_topic, InboundMessage, OutboundMessage, EVENT_CLOSE,
    EVENT_ERROR, EVENT_MESSAGE, EVENT_OPEN, EVENT_RECONNECT_FAILED,
};
#[doc(hidden)]
pub use registry::{invoke_isolated, Callback, ListenerRegistry, SubscriptionRegistry};
pub use transport::{build_url, Connector, FrameSink, FrameStream, Transport, WsConnector};
