//! Scripted in-memory connector for channel manager tests

use async_trait::async_trait;
use futures_util::{stream, Sink};
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::error::{RealtimeError, RealtimeResult};
use super::transport::{Connector, Transport};

/// Outcome of one connect call
pub(crate) enum Script {
    Accept,
    Refuse,
    /// Wait for the test to decide: `true` accepts, `false` refuses
    Hold(oneshot::Receiver<bool>),
}

/// Server side of an accepted mock connection
pub(crate) struct MockPeer {
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub inbound: mpsc::UnboundedSender<RealtimeResult<String>>,
}

impl MockPeer {
    /// Deliver a text frame to the client
    pub fn push(&self, text: &str) {
        let _ = self.inbound.send(Ok(text.to_string()));
    }

    /// Deliver a JSON payload to the client
    pub fn push_json(&self, value: Value) {
        self.push(&value.to_string());
    }

    /// Next frame written by the client, heartbeats included
    pub async fn next_raw_frame(&mut self) -> Option<Value> {
        let text = tokio::time::timeout(Duration::from_secs(1), self.outbound.recv())
            .await
            .ok()??;
        serde_json::from_str(&text).ok()
    }

    /// Next non-heartbeat frame written by the client
    pub async fn next_frame(&mut self) -> Option<Value> {
        loop {
            let frame = self.next_raw_frame().await?;
            if frame["type"] != "ping" {
                return Some(frame);
            }
        }
    }

    /// Everything the client has written so far
    pub fn drain(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(text) = self.outbound.try_recv() {
            if let Ok(value) = serde_json::from_str(&text) {
                frames.push(value);
            }
        }
        frames
    }
}

struct MockSink {
    tx: mpsc::UnboundedSender<String>,
    broken: Arc<AtomicBool>,
}

impl Sink<String> for MockSink {
    type Error = RealtimeError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(RealtimeError::Send("broken pipe".to_string()));
        }
        self.tx
            .send(item)
            .map_err(|_| RealtimeError::Send("peer went away".to_string()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// Connector that follows a script and hands each accepted peer to the test
///
/// Calls beyond the script are accepted.
pub(crate) struct MockConnector {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<(String, Instant)>>,
    broken: Arc<AtomicBool>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            scripts: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            broken: Arc::new(AtomicBool::new(false)),
            peers,
        });
        (connector, peer_rx)
    }

    pub fn script(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn refuse(&self, times: usize) {
        for _ in 0..times {
            self.script(Script::Refuse);
        }
    }

    /// Make every write on every connection fail
    pub fn break_writes(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    fn accept(&self) -> Transport {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel::<RealtimeResult<String>>();

        let _ = self.peers.send(MockPeer {
            outbound: out_rx,
            inbound: in_tx,
        });

        let sink = MockSink {
            tx: out_tx,
            broken: Arc::clone(&self.broken),
        };
        let stream = stream::poll_fn(move |cx| in_rx.poll_recv(cx));

        Transport::new(Box::pin(sink), Box::pin(stream))
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> RealtimeResult<Transport> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        let script = self.scripts.lock().unwrap().pop_front();
        match script.unwrap_or(Script::Accept) {
            Script::Accept => Ok(self.accept()),
            Script::Refuse => Err(RealtimeError::Connect("connection refused".to_string())),
            Script::Hold(decision) => match decision.await {
                Ok(true) => Ok(self.accept()),
                _ => Err(RealtimeError::Connect("connection refused".to_string())),
            },
        }
    }
}
