//! Realtime channel error types
//!
//! Defines all errors surfaced by the channel manager and its transports.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur on the realtime channel
///
/// Every caller awaiting a shared connect attempt receives a clone of its
/// outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    /// The transport refused or failed the handshake
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The handshake did not complete in time
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// An established transport broke while reading
    #[error("Transport error: {0}")]
    Transport(String),

    /// Writing a frame to the transport failed
    #[error("Send failed: {0}")]
    Send(String),

    /// Message could not be serialized to JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No connection exists and no token is known to open one
    #[error("Not connected")]
    NotConnected,

    /// The operation was overtaken by an explicit disconnect
    #[error("Connection attempt cancelled by disconnect")]
    Cancelled,

    /// Automatic reconnection gave up
    #[error("Reconnect failed after {0} attempts")]
    ReconnectExhausted(u32),
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::Serialization(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RealtimeError::Transport(err.to_string())
    }
}

/// Result type alias for realtime operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RealtimeError::Connect("refused".to_string());
        assert_eq!(err.to_string(), "Connection failed: refused");

        let err = RealtimeError::ReconnectExhausted(5);
        assert_eq!(err.to_string(), "Reconnect failed after 5 attempts");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: RealtimeError = json_err.into();
        assert!(matches!(err, RealtimeError::Serialization(_)));
    }
}
