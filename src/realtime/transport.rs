//! Transport seam
//!
//! The channel manager only needs two things from a transport: a sink that
//! accepts text frames and a stream that yields them. The stream ending means
//! the peer closed the connection.

use async_trait::async_trait;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::error::{RealtimeError, RealtimeResult};

/// Outbound half of a connection
pub type FrameSink = Pin<Box<dyn Sink<String, Error = RealtimeError> + Send>>;

/// Inbound half of a connection
pub type FrameStream = Pin<Box<dyn Stream<Item = RealtimeResult<String>> + Send>>;

/// An established, full-duplex text-frame connection
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Transport {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

/// Opens transports to a fully qualified URL
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> RealtimeResult<Transport>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> RealtimeResult<Transport> {
        let (socket, response) = connect_async(url)
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;

        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = socket.split();

        let sink = sink
            .sink_map_err(RealtimeError::from)
            .with(|text: String| future::ready(Ok::<_, RealtimeError>(Message::Text(text))));

        let stream = stream.filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        tracing::warn!("Dropping non-UTF-8 binary frame");
                        None
                    }
                },
                Ok(Message::Close(frame)) => {
                    tracing::debug!(frame = ?frame, "Server sent close frame");
                    None
                }
                // Protocol-level ping/pong is answered by tungstenite itself
                Ok(_) => None,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => None,
                Err(e) => Some(Err(RealtimeError::from(e))),
            })
        });

        Ok(Transport::new(Box::pin(sink), Box::pin(stream)))
    }
}

/// Attach the auth token to the endpoint URL as a query parameter
///
/// An empty token leaves the URL untouched.
pub fn build_url(base: &str, param: &str, token: &str) -> String {
    if token.is_empty() {
        return base.to_string();
    }

    let separator = match base.find('?') {
        None => "?",
        Some(_) if base.ends_with('?') || base.ends_with('&') => "",
        Some(_) => "&",
    };

    format!(
        "{}{}{}={}",
        base,
        separator,
        param,
        urlencoding::encode(token)
    )
}
