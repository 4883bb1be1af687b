//! Realtime Channel Manager
//!
//! Owns a single logical connection to the Expeta backend and multiplexes any
//! number of topic subscriptions over it.
//!
//! - Connect attempts are coalesced: one transport at most, pending or open
//! - Heartbeat pings keep the connection alive and detect dead transports
//! - Unexpected closes reconnect with exponential backoff
//! - Active subscriptions are replayed on every new connection
//!
//! Every live connection belongs to a session (`epoch`). Explicit disconnects
//! and unexpected closes both end the session, and any task or connect
//! attempt still holding an older epoch is ignored when it reports back.

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use super::error::{RealtimeError, RealtimeResult};
use super::messages::{
    conversation_topic, generation_topic, InboundMessage, OutboundMessage, EVENT_CLOSE,
    EVENT_ERROR, EVENT_MESSAGE, EVENT_OPEN, EVENT_RECONNECT_FAILED,
};
use super::registry::{invoke_isolated, Callback, ListenerRegistry, SubscriptionRegistry};
use super::transport::{build_url, Connector, FrameSink, FrameStream, Transport, WsConnector};
use crate::config::RealtimeConfig;

/// Lifecycle of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnection gave up; only an explicit `connect` leaves this state
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Description of an established connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Unique per transport; a reconnect yields a new id
    pub id: Uuid,
    pub connected_at: DateTime<Utc>,
}

type PendingConnect = Shared<BoxFuture<'static, RealtimeResult<Connection>>>;

struct Outbound {
    frame: String,
    ack: Option<oneshot::Sender<RealtimeResult<()>>>,
}

struct Live {
    info: Connection,
    outbound: mpsc::UnboundedSender<Outbound>,
    reader: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl Live {
    /// Stop the background tasks. Dropping `outbound` lets the writer flush
    /// and close the sink.
    fn shutdown(self) {
        self.reader.abort();
        self.heartbeat.abort();
    }
}

struct SharedState {
    state: ConnectionState,
    token: Option<String>,
    reconnect_attempt: u32,
    epoch: u64,
    connection: Option<Live>,
    pending: Option<PendingConnect>,
    reconnect_timer: Option<JoinHandle<()>>,
    subscriptions: SubscriptionRegistry,
}

type PendingEvents = Vec<(&'static str, Value)>;

struct Inner {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    shared: Mutex<SharedState>,
    listeners: Mutex<ListenerRegistry>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Manages the realtime channel for one application session
///
/// Construct one per session and hand it (typically as `Arc<ChannelManager>`)
/// to whatever needs live updates. Dropping the manager disconnects it.
///
/// Must be used from within a Tokio runtime.
pub struct ChannelManager {
    inner: Arc<Inner>,
}

impl ChannelManager {
    /// Manager using the WebSocket transport
    pub fn new(config: RealtimeConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Manager using a caller-supplied transport
    pub fn with_connector(config: RealtimeConfig, connector: Arc<dyn Connector>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                shared: Mutex::new(SharedState {
                    state: ConnectionState::Disconnected,
                    token: None,
                    reconnect_attempt: 0,
                    epoch: 0,
                    connection: None,
                    pending: None,
                    reconnect_timer: None,
                    subscriptions: SubscriptionRegistry::new(),
                }),
                listeners: Mutex::new(ListenerRegistry::new()),
                state_tx,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Receiver notified on every state transition
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Consecutive failures since the last successful connection
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.lock().reconnect_attempt
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connection.is_some()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }

    /// Open the connection, or join the one already open or in flight
    ///
    /// The token is remembered and reused by every reconnect. On failure the
    /// error is returned and a reconnect is scheduled.
    pub async fn connect(&self, token: impl Into<String>) -> RealtimeResult<Connection> {
        self.inner.connect(token.into()).await
    }

    /// Close the connection and drop all subscriptions
    ///
    /// Cancels the heartbeat and any pending reconnect. A connect attempt
    /// still in flight resolves with [`RealtimeError::Cancelled`]. Safe to
    /// call repeatedly.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Serialize and transmit an application payload
    ///
    /// Opens the connection with the last known token if needed, and waits
    /// out a reconnect in progress. Resolves once the transport accepted the
    /// frame. Frames sent on one connection go out in call order.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> RealtimeResult<()> {
        let frame = serde_json::to_string(message)?;
        self.inner.ensure_connected().await?;
        self.inner.send_frame(frame).await
    }

    /// Route inbound frames whose `subscriptionId` equals `topic` to `callback`
    ///
    /// One callback per topic: subscribing again replaces the previous
    /// callback. The server is told about the subscription as soon as a
    /// connection is live.
    pub fn subscribe<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.subscribe(topic.into(), Arc::new(callback))
    }

    /// Subscribe to `conversation:<id>`
    pub fn subscribe_to_conversation<F>(&self, conversation_id: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(conversation_topic(conversation_id), callback)
    }

    /// Subscribe to `generation:<id>`
    pub fn subscribe_to_generation<F>(&self, generation_id: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(generation_topic(generation_id), callback)
    }

    /// Listen for a channel event or an inbound `type`
    ///
    /// Built-in events are `message`, `open`, `close`, `error` and
    /// `reconnectFailed`; any other name matches inbound payloads by their
    /// `type` field. Any number of listeners may share an event type.
    pub fn add_event_listener<F>(&self, event_type: &str, callback: F) -> ListenerHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self
            .inner
            .listeners()
            .insert(event_type, Arc::new(callback));
        ListenerHandle {
            event_type: event_type.to_string(),
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

/// Handle returned by [`ChannelManager::subscribe`]
#[derive(Debug)]
#[must_use = "dropping the handle keeps the subscription; call unsubscribe() to end it"]
pub struct Subscription {
    topic: String,
    generation: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Stop local delivery and tell the server, if connected
    ///
    /// No-op if the topic has since been re-subscribed by someone else.
    pub fn unsubscribe(self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let shared = &mut *inner.lock();
        if !shared.subscriptions.remove(&self.topic, self.generation) {
            tracing::debug!(topic = %self.topic, "Ignoring unsubscribe from a replaced subscription");
            return;
        }
        if shared.connection.is_some() {
            inner.enqueue(shared, &OutboundMessage::unsubscribe(&self.topic));
        }
        tracing::debug!(topic = %self.topic, "Unsubscribed");
    }
}

/// Handle returned by [`ChannelManager::add_event_listener`]
#[derive(Debug)]
#[must_use = "dropping the handle keeps the listener; call remove() to end it"]
pub struct ListenerHandle {
    event_type: String,
    id: u64,
    inner: Weak<Inner>,
}

impl ListenerHandle {
    pub fn remove(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners().remove(&self.event_type, self.id);
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, ListenerRegistry> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, shared: &mut SharedState, state: ConnectionState) {
        if shared.state != state {
            tracing::debug!(from = %shared.state, to = %state, "Realtime state change");
        }
        shared.state = state;
        self.state_tx.send_replace(state);
    }

    async fn connect(self: &Arc<Self>, token: String) -> RealtimeResult<Connection> {
        let pending = {
            let shared = &mut *self.lock();
            shared.token = Some(token);

            if let Some(live) = &shared.connection {
                return Ok(live.info.clone());
            }

            if let Some(pending) = shared.pending.clone() {
                pending
            } else {
                if matches!(
                    shared.state,
                    ConnectionState::Disconnected | ConnectionState::Failed
                ) {
                    shared.reconnect_attempt = 0;
                }
                if let Some(timer) = shared.reconnect_timer.take() {
                    timer.abort();
                }
                self.begin_attempt(shared, ConnectionState::Connecting)
            }
        };

        pending.await
    }

    /// Start a connect attempt for the current session
    ///
    /// The attempt runs on its own task so that it completes even if every
    /// caller stops waiting on it.
    fn begin_attempt(
        self: &Arc<Self>,
        shared: &mut SharedState,
        state: ConnectionState,
    ) -> PendingConnect {
        let epoch = shared.epoch;
        let token = shared.token.clone().unwrap_or_default();
        let url = build_url(&self.config.url, &self.config.token_param, &token);

        let inner = Arc::clone(self);
        let attempt = tokio::spawn(async move { inner.run_attempt(epoch, url).await });

        let pending = async move {
            attempt
                .await
                .unwrap_or_else(|e| Err(RealtimeError::Connect(format!("connect task failed: {}", e))))
        }
        .boxed()
        .shared();

        shared.pending = Some(pending.clone());
        self.set_state(shared, state);
        pending
    }

    async fn run_attempt(self: Arc<Self>, epoch: u64, url: String) -> RealtimeResult<Connection> {
        let timeout = self.config.connect_timeout();
        let outcome = match tokio::time::timeout(timeout, self.connector.connect(&url)).await {
            Ok(result) => result,
            Err(_) => Err(RealtimeError::Timeout(timeout)),
        };

        let mut events = PendingEvents::new();
        let result = {
            let shared = &mut *self.lock();
            if shared.epoch != epoch {
                tracing::debug!("Discarding connect attempt overtaken by disconnect");
                return Err(RealtimeError::Cancelled);
            }
            shared.pending = None;

            match outcome {
                Ok(transport) => {
                    let info = self.install(shared, transport, epoch);
                    events.push((
                        EVENT_OPEN,
                        json!({ "type": EVENT_OPEN, "connectionId": info.id.to_string() }),
                    ));
                    Ok(info)
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        failures = shared.reconnect_attempt + 1,
                        "Realtime connect attempt failed"
                    );
                    events.push((EVENT_ERROR, error_event(&err)));
                    events.extend(self.schedule_reconnect(shared));
                    Err(err)
                }
            }
        };

        self.emit_all(events);
        result
    }

    /// Wire up a fresh transport as the live connection
    ///
    /// Subscription replay is queued before the connection is published, so
    /// it precedes any frame sent by callers on this connection.
    fn install(
        self: &Arc<Self>,
        shared: &mut SharedState,
        transport: Transport,
        epoch: u64,
    ) -> Connection {
        let Transport { sink, stream } = transport;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let topics = shared.subscriptions.topics();
        for topic in &topics {
            match OutboundMessage::subscribe(topic.as_str()).to_frame() {
                Ok(frame) => {
                    let _ = outbound.send(Outbound { frame, ack: None });
                }
                Err(e) => tracing::warn!(topic = %topic, error = %e, "Failed to encode replay"),
            }
        }

        tokio::spawn(write_loop(sink, outbound_rx));
        let reader = tokio::spawn(Arc::clone(self).read_loop(stream, epoch));
        let heartbeat = tokio::spawn(Arc::clone(self).heartbeat_loop(epoch));

        let info = Connection {
            id: Uuid::new_v4(),
            connected_at: Utc::now(),
        };
        shared.reconnect_attempt = 0;
        shared.connection = Some(Live {
            info: info.clone(),
            outbound,
            reader,
            heartbeat,
        });
        self.set_state(shared, ConnectionState::Connected);

        tracing::info!(
            connection_id = %info.id,
            replayed = topics.len(),
            "Realtime channel connected"
        );
        info
    }

    /// Count a failure and either arm the reconnect timer or give up
    ///
    /// Returns events to emit once the lock is released.
    fn schedule_reconnect(self: &Arc<Self>, shared: &mut SharedState) -> PendingEvents {
        if let Some(timer) = shared.reconnect_timer.take() {
            timer.abort();
        }

        shared.reconnect_attempt += 1;
        let attempt = shared.reconnect_attempt;
        let policy = self.config.reconnect_policy();

        if policy.should_give_up(attempt) {
            self.set_state(shared, ConnectionState::Failed);
            tracing::error!(
                attempts = policy.max_attempts,
                "Realtime reconnection exhausted, giving up"
            );
            return vec![(
                EVENT_RECONNECT_FAILED,
                json!({ "type": EVENT_RECONNECT_FAILED, "attempts": policy.max_attempts }),
            )];
        }

        let delay = policy.delay_for(attempt);
        let epoch = shared.epoch;
        let inner = Arc::clone(self);
        shared.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire_reconnect(epoch);
        }));
        self.set_state(shared, ConnectionState::Reconnecting);

        tracing::info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduled realtime reconnect"
        );
        Vec::new()
    }

    fn fire_reconnect(self: &Arc<Self>, epoch: u64) {
        let shared = &mut *self.lock();
        if shared.epoch != epoch || shared.connection.is_some() || shared.pending.is_some() {
            return;
        }
        // This task is the timer; detach rather than abort it
        shared.reconnect_timer = None;
        tracing::info!(attempt = shared.reconnect_attempt, "Attempting realtime reconnect");
        let _ = self.begin_attempt(shared, ConnectionState::Reconnecting);
    }

    fn handle_unexpected_close(self: &Arc<Self>, epoch: u64, reason: &str) {
        let events = {
            let shared = &mut *self.lock();
            if shared.epoch != epoch {
                return;
            }
            let Some(live) = shared.connection.take() else {
                return;
            };
            shared.epoch += 1;
            live.shutdown();

            tracing::warn!(reason, "Realtime connection lost");
            let mut events: PendingEvents = vec![(
                EVENT_CLOSE,
                json!({ "type": EVENT_CLOSE, "reason": reason, "expected": false }),
            )];
            events.extend(self.schedule_reconnect(shared));
            events
        };
        self.emit_all(events);
    }

    fn disconnect(&self) {
        let was_connected = {
            let shared = &mut *self.lock();
            shared.epoch += 1;
            shared.pending = None;
            if let Some(timer) = shared.reconnect_timer.take() {
                timer.abort();
            }
            let live = shared.connection.take();
            let was_connected = live.is_some();
            if let Some(live) = live {
                live.shutdown();
            }
            shared.subscriptions.clear();
            shared.reconnect_attempt = 0;
            self.set_state(shared, ConnectionState::Disconnected);
            was_connected
        };

        if was_connected {
            tracing::info!("Realtime channel disconnected");
            self.emit(
                EVENT_CLOSE,
                &json!({ "type": EVENT_CLOSE, "reason": "client disconnect", "expected": true }),
            );
        }
    }

    async fn ensure_connected(self: &Arc<Self>) -> RealtimeResult<()> {
        enum Next {
            Ready,
            Join(PendingConnect),
            Open(String),
            Wait,
        }

        let next = {
            let shared = self.lock();
            match shared.state {
                ConnectionState::Connected => Next::Ready,
                ConnectionState::Connecting => {
                    shared.pending.clone().map(Next::Join).unwrap_or(Next::Wait)
                }
                ConnectionState::Reconnecting => Next::Wait,
                ConnectionState::Failed => {
                    return Err(RealtimeError::ReconnectExhausted(
                        self.config.max_reconnect_attempts,
                    ))
                }
                ConnectionState::Disconnected => match shared.token.clone() {
                    Some(token) => Next::Open(token),
                    None => return Err(RealtimeError::NotConnected),
                },
            }
        };

        match next {
            Next::Ready => Ok(()),
            Next::Join(pending) => pending.await.map(|_| ()),
            Next::Open(token) => self.connect(token).await.map(|_| ()),
            Next::Wait => {
                let mut changes = self.state_tx.subscribe();
                let state = *changes
                    .wait_for(|s| {
                        !matches!(s, ConnectionState::Connecting | ConnectionState::Reconnecting)
                    })
                    .await
                    .map_err(|_| RealtimeError::NotConnected)?;
                match state {
                    ConnectionState::Connected => Ok(()),
                    ConnectionState::Failed => Err(RealtimeError::ReconnectExhausted(
                        self.config.max_reconnect_attempts,
                    )),
                    _ => Err(RealtimeError::NotConnected),
                }
            }
        }
    }

    async fn send_frame(&self, frame: String) -> RealtimeResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        {
            let shared = self.lock();
            let live = shared.connection.as_ref().ok_or(RealtimeError::NotConnected)?;
            live.outbound
                .send(Outbound {
                    frame,
                    ack: Some(ack_tx),
                })
                .map_err(|_| RealtimeError::Send("connection writer has stopped".to_string()))?;
        }

        ack_rx
            .await
            .map_err(|_| RealtimeError::Send("connection closed before the frame was written".to_string()))?
    }

    /// Queue a protocol frame on the live connection without waiting
    fn enqueue(&self, shared: &SharedState, message: &OutboundMessage) -> bool {
        let Some(live) = &shared.connection else {
            return false;
        };
        match message.to_frame() {
            Ok(frame) => live.outbound.send(Outbound { frame, ack: None }).is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode protocol frame");
                false
            }
        }
    }

    /// Queue a protocol frame only if `epoch` is still the live session
    fn enqueue_for(&self, epoch: u64, message: &OutboundMessage) -> bool {
        let shared = self.lock();
        shared.epoch == epoch && self.enqueue(&shared, message)
    }

    fn subscribe(self: &Arc<Self>, topic: String, callback: Callback) -> Subscription {
        let (generation, open_with) = {
            let shared = &mut *self.lock();
            let (generation, replaced) = shared.subscriptions.insert(&topic, callback);
            if replaced {
                tracing::debug!(topic = %topic, "Replacing existing subscription");
            }

            let mut open_with = None;
            match shared.state {
                ConnectionState::Connected => {
                    self.enqueue(shared, &OutboundMessage::subscribe(topic.as_str()));
                }
                ConnectionState::Disconnected => open_with = shared.token.clone(),
                // A pending connection replays it; a failed one waits for connect()
                _ => {}
            }
            (generation, open_with)
        };

        if let Some(token) = open_with {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = inner.connect(token).await {
                    tracing::warn!(error = %e, "Connect for new subscription failed");
                }
            });
        }

        tracing::debug!(topic = %topic, "Subscribed");
        Subscription {
            topic,
            generation,
            inner: Arc::downgrade(self),
        }
    }

    async fn read_loop(self: Arc<Self>, mut stream: FrameStream, epoch: u64) {
        let reason = loop {
            match stream.next().await {
                Some(Ok(text)) => self.handle_frame(&text, epoch),
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "Realtime transport error");
                    self.emit(EVENT_ERROR, &error_event(&err));
                    break err.to_string();
                }
                None => break "connection closed by peer".to_string(),
            }
        };
        self.handle_unexpected_close(epoch, &reason);
    }

    fn handle_frame(&self, text: &str, epoch: u64) {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, bytes = text.len(), "Discarding malformed realtime frame");
                return;
            }
        };

        if message.is_ping() {
            self.enqueue_for(epoch, &OutboundMessage::Pong);
            return;
        }
        if message.is_pong() {
            tracing::trace!("Heartbeat acknowledged");
            return;
        }

        self.dispatch(&message);
    }

    /// Fan an inbound payload out to `message` listeners, listeners for its
    /// `type`, and the subscriber for its `subscriptionId`
    fn dispatch(&self, message: &InboundMessage) {
        let payload = message.payload();

        self.emit(EVENT_MESSAGE, payload);

        if let Some(kind) = message.kind().filter(|kind| *kind != EVENT_MESSAGE) {
            self.emit(kind, payload);
        }

        if let Some(topic) = message.subscription_id() {
            let callback = self.lock().subscriptions.get(topic);
            match callback {
                Some(callback) => {
                    invoke_isolated(&callback, payload, topic);
                }
                None => tracing::trace!(topic, "No subscriber for inbound frame"),
            }
        }
    }

    async fn heartbeat_loop(self: Arc<Self>, epoch: u64) {
        let period = self.config.heartbeat_interval();
        if period.is_zero() {
            return;
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let (ack_tx, ack_rx) = oneshot::channel();
            let queued = {
                let shared = self.lock();
                if shared.epoch != epoch {
                    return;
                }
                match (&shared.connection, OutboundMessage::Ping.to_frame()) {
                    (Some(live), Ok(frame)) => live
                        .outbound
                        .send(Outbound {
                            frame,
                            ack: Some(ack_tx),
                        })
                        .is_ok(),
                    _ => false,
                }
            };

            let accepted = queued
                && matches!(tokio::time::timeout(period, ack_rx).await, Ok(Ok(Ok(()))));
            if !accepted {
                tracing::warn!("Heartbeat failed, closing transport");
                self.handle_unexpected_close(epoch, "heartbeat failed");
                return;
            }
            tracing::trace!("Heartbeat sent");
        }
    }

    fn emit(&self, event_type: &str, payload: &Value) {
        let callbacks = self.listeners().snapshot(event_type);
        for callback in callbacks {
            invoke_isolated(&callback, payload, event_type);
        }
    }

    fn emit_all(&self, events: PendingEvents) {
        for (event_type, payload) in events {
            self.emit(event_type, &payload);
        }
    }
}

async fn write_loop(mut sink: FrameSink, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(Outbound { frame, ack }) = outbound.recv().await {
        let result = sink.send(frame).await;
        if let Err(e) = &result {
            tracing::debug!(error = %e, "Realtime frame write failed");
        }
        if let Some(ack) = ack {
            let _ = ack.send(result);
        }
    }
    let _ = sink.close().await;
}

fn error_event(err: &RealtimeError) -> Value {
    json!({ "type": EVENT_ERROR, "message": err.to_string() })
}
