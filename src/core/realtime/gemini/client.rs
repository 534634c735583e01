//! Gemini Live WebSocket client implementation.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON frames, server frames usually binary
//! - First frame after open: `{"setup": <config>}`
//!
//! # Connection lifecycle
//!
//! Every connection attempt gets a new generation number. The task that opens
//! a socket keeps reading from it and reports its close tagged with that
//! generation; anything reported for an older generation is ignored. An
//! explicit `disconnect()` bumps the generation, so the close that follows it
//! never schedules a reconnect.
//!
//! # Example
//!
//! ```rust,ignore
//! use gemini_live_client::core::realtime::{GeminiLiveClient, GeminiLiveConfig, LiveEvent};
//!
//! let client = GeminiLiveClient::new(GeminiLiveConfig::new("your-api-key"))?;
//! let mut events = client.take_events().unwrap();
//! client.connect().await?;
//! client.send_text("What do you see?").await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         LiveEvent::Audio(pcm) => player.push(pcm),
//!         LiveEvent::Content(turn) => println!("{turn:?}"),
//!         LiveEvent::Disconnected => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use super::config::GeminiLiveConfig;
use super::messages::{ClientMessage, decode_server_message, encode_client_message};
use super::router::route_server_message;
use crate::core::realtime::base::{
    BaseRealtime, ConnectionState, EventReceiver, EventSender, LiveEvent, RealtimeError,
    RealtimeResult, ToolResponseInput,
};

/// Reason sent with the normal-closure frame on explicit disconnect.
pub const CLIENT_CLOSE_REASON: &str = "Disconnected by client";

/// How long a disconnected socket may take to finish the close handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type SharedSink = Arc<tokio::sync::Mutex<WsSink>>;

/// Outcome of one connection attempt, awaited by every interested caller.
type PendingConnection = Shared<BoxFuture<'static, RealtimeResult<()>>>;

// =============================================================================
// Connection State Machine
// =============================================================================

/// The attempt currently in flight.
struct PendingAttempt {
    generation: u64,
    future: PendingConnection,
    resolver: oneshot::Sender<RealtimeResult<()>>,
}

/// Mutable connection state. Only touched under `Inner::machine`.
#[derive(Default)]
struct Machine {
    state: ConnectionState,
    /// Reconnect attempts since the last successful setup or explicit connect
    attempt: u32,
    /// Identifies the socket whose events are currently honored
    generation: u64,
    /// Write half of the open socket
    sink: Option<SharedSink>,
    /// Task that opens the socket and then reads from it
    connection_task: Option<JoinHandle<()>>,
    pending: Option<PendingAttempt>,
    /// Scheduled reconnect, cancelled on disconnect or explicit connect
    reconnect_task: Option<JoinHandle<()>>,
    /// `Disconnected` was emitted; cleared by an explicit connect or an open
    terminal: bool,
}

impl Machine {
    fn is_ready(&self) -> bool {
        self.state == ConnectionState::Open && self.sink.is_some()
    }

    /// Settle the pending attempt if it belongs to `generation`.
    fn settle(&mut self, generation: u64, result: RealtimeResult<()>) {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation)
            && let Some(pending) = self.pending.take()
        {
            let _ = pending.resolver.send(result);
        }
    }
}

struct Inner {
    config: GeminiLiveConfig,
    /// Endpoint including the API key; never logged
    url: String,
    machine: Mutex<Machine>,
    events: EventSender,
    event_receiver: Mutex<Option<EventReceiver>>,
}

impl Inner {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn emit(&self, event: LiveEvent) {
        if self.events.send(event).is_err() {
            trace!("{} has no event receiver, event dropped", self.name());
        }
    }

    /// Start a new attempt. The caller holds the machine lock.
    fn start_attempt(self: &Arc<Self>, machine: &mut Machine) -> PendingConnection {
        if let Some(handle) = machine.reconnect_task.take() {
            handle.abort();
        }
        if let Some(task) = machine.connection_task.take() {
            debug!("{} discarding stale socket", self.name());
            task.abort();
        }
        machine.sink = None;

        machine.generation += 1;
        let generation = machine.generation;
        machine.state = ConnectionState::Connecting;

        if let Some(previous) = machine.pending.take() {
            let _ = previous.resolver.send(Err(RealtimeError::ConnectionFailed(
                "superseded by a new connection attempt".to_string(),
            )));
        }

        let (resolver, outcome) = oneshot::channel();
        let future = async move {
            outcome.await.unwrap_or_else(|_| {
                Err(RealtimeError::ConnectionFailed(
                    "connection attempt abandoned".to_string(),
                ))
            })
        }
        .boxed()
        .shared();

        machine.pending = Some(PendingAttempt {
            generation,
            future: future.clone(),
            resolver,
        });
        machine.connection_task = Some(tokio::spawn(run_connection(Arc::clone(self), generation)));

        info!(
            "{} establishing WebSocket connection to {}",
            self.name(),
            self.config.redacted_url()
        );
        future
    }

    /// Reject the in-flight attempt without touching the socket lifecycle.
    fn fail_attempt(&self, generation: u64, err: RealtimeError) {
        let mut machine = self.machine.lock();
        if machine.generation == generation {
            machine.settle(generation, Err(err));
        }
    }

    /// A timed out reconnect counts against the backoff budget. A timed out
    /// first attempt only fails its waiters.
    fn handle_timeout(self: &Arc<Self>, generation: u64) {
        let mut machine = self.machine.lock();
        if machine.generation != generation {
            return;
        }

        error!(
            "{} WebSocket connection timeout after {}ms",
            self.name(),
            self.config.connection_timeout_ms
        );
        machine.settle(
            generation,
            Err(RealtimeError::Timeout(format!(
                "Connection timeout after {}ms",
                self.config.connection_timeout_ms
            ))),
        );
        if machine.attempt > 0 {
            drop(machine);
            self.handle_close(generation, "connection timeout");
            return;
        }
        machine.connection_task = None;
        machine.sink = None;
        machine.state = ConnectionState::Closed;
    }

    /// Publish the write half before setup goes out so `disconnect()` can
    /// close the socket with a proper frame. Returns false when superseded.
    fn attach_sink(&self, generation: u64, sink: SharedSink) -> bool {
        let mut machine = self.machine.lock();
        if machine.generation != generation {
            return false;
        }
        machine.sink = Some(sink);
        true
    }

    /// Record a successful open. Returns false when the attempt was superseded.
    fn mark_open(&self, generation: u64) -> bool {
        let mut machine = self.machine.lock();
        if machine.generation != generation {
            return false;
        }

        machine.state = ConnectionState::Open;
        machine.attempt = 0;
        machine.terminal = false;
        machine.settle(generation, Ok(()));
        info!("{} successfully connected to websocket", self.name());
        true
    }

    /// Close handling for the socket of `generation`.
    fn handle_close(self: &Arc<Self>, generation: u64, reason: &str) {
        let mut machine = self.machine.lock();
        if machine.generation != generation {
            trace!("{} ignoring close of superseded socket", self.name());
            return;
        }

        warn!("{} WebSocket connection closed: {reason}", self.name());
        machine.sink = None;
        machine.connection_task = None;
        machine.settle(
            generation,
            Err(RealtimeError::ClosedDuringConnection(reason.to_string())),
        );

        let policy = &self.config.reconnection;
        if !policy.should_retry(machine.attempt) {
            machine.state = ConnectionState::Closed;
            error!(
                "{} maximum reconnection attempts ({}) reached",
                self.name(),
                policy.max_attempts
            );
            if !machine.terminal {
                machine.terminal = true;
                self.emit(LiveEvent::Disconnected);
            }
            return;
        }

        machine.attempt += 1;
        let attempt = machine.attempt;
        let delay = policy.delay_for(attempt);
        machine.state = ConnectionState::Reconnecting;
        info!(
            "{} attempting to reconnect ({attempt}/{}) in {}ms",
            self.name(),
            policy.max_attempts,
            delay.as_millis()
        );
        self.emit(LiveEvent::Reconnecting { attempt, delay });

        let inner = Arc::clone(self);
        machine.reconnect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.reconnect_now(generation);
        }));
    }

    /// Fired by the reconnect timer.
    fn reconnect_now(self: &Arc<Self>, closed_generation: u64) {
        let mut machine = self.machine.lock();
        if machine.generation != closed_generation
            || machine.state != ConnectionState::Reconnecting
        {
            return;
        }

        // This task is the timer; let it finish instead of aborting itself.
        machine.reconnect_task = None;
        debug!("{} reconnecting now", self.name());
        let _ = self.start_attempt(&mut machine);
    }

    /// Route one inbound frame. Frames from a superseded socket are dropped.
    fn dispatch(&self, generation: u64, payload: &[u8]) {
        let msg = match decode_server_message(payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("{} dropped inbound frame: {e}", self.name());
                return;
            }
        };

        let machine = self.machine.lock();
        if machine.generation != generation {
            trace!("{} dropped frame from superseded socket", self.name());
            return;
        }
        for event in route_server_message(self.name(), msg) {
            self.emit(event);
        }
    }

    async fn write(&self, sink: &SharedSink, msg: &ClientMessage) -> RealtimeResult<()> {
        let json = encode_client_message(msg)?;
        sink.lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
    }
}

/// Open the socket for `generation`, send setup, then read until it closes.
async fn run_connection(inner: Arc<Inner>, generation: u64) {
    let connect = connect_async(inner.url.as_str());
    let ws_stream = match tokio::time::timeout(inner.config.connection_timeout(), connect).await {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(e)) => {
            error!(
                "{} could not connect to {}: {e}",
                inner.name(),
                inner.config.redacted_url()
            );
            inner.fail_attempt(generation, RealtimeError::ConnectionFailed(e.to_string()));
            inner.handle_close(generation, &format!("connection error: {e}"));
            return;
        }
        Err(_) => {
            inner.handle_timeout(generation);
            return;
        }
    };

    let (ws_sink, ws_source) = ws_stream.split();
    let sink: SharedSink = Arc::new(tokio::sync::Mutex::new(ws_sink));

    if !inner.attach_sink(generation, Arc::clone(&sink)) {
        debug!("{} connection superseded before setup", inner.name());
        return;
    }

    let setup = ClientMessage::setup(inner.config.setup_payload());
    if let Err(e) = inner.write(&sink, &setup).await {
        error!("{} error sending setup message: {e}", inner.name());
        inner.fail_attempt(generation, e);
        inner.handle_close(generation, "setup failed");
        return;
    }
    debug!("{} setup message sent", inner.name());

    if !inner.mark_open(generation) {
        debug!("{} connection superseded before setup completed", inner.name());
        return;
    }

    let reason = read_frames(&inner, generation, &sink, ws_source).await;
    inner.handle_close(generation, &reason);
}

/// Read loop. Returns a description of why the socket ended.
async fn read_frames(
    inner: &Inner,
    generation: u64,
    sink: &SharedSink,
    mut source: WsSource,
) -> String {
    while let Some(msg) = source.next().await {
        match msg {
            Ok(Message::Binary(data)) => inner.dispatch(generation, &data),
            Ok(Message::Text(text)) => inner.dispatch(generation, text.as_str().as_bytes()),
            Ok(Message::Ping(data)) => {
                if let Err(e) = sink.lock().await.send(Message::Pong(data)).await {
                    debug!("{} failed to send pong: {e}", inner.name());
                }
            }
            Ok(Message::Close(frame)) => {
                return match frame {
                    Some(frame) => format!("{} {}", u16::from(frame.code), frame.reason.as_str()),
                    None => "closed without status".to_string(),
                };
            }
            Ok(_) => {}
            Err(e) => return format!("WebSocket error: {e}"),
        }
    }
    "stream ended".to_string()
}

// =============================================================================
// Gemini Live Client
// =============================================================================

/// Gemini Live streaming client.
///
/// Cloning is cheap and every clone drives the same session. Sends made while
/// the socket is down wait for (or start) a connection attempt; unclean
/// closes are retried with exponential backoff until the configured number of
/// attempts is spent, at which point [`LiveEvent::Disconnected`] is emitted.
///
/// Call [`disconnect`](Self::disconnect) to release the socket; background
/// tasks keep the session alive otherwise.
#[derive(Clone)]
pub struct GeminiLiveClient {
    inner: Arc<Inner>,
}

impl GeminiLiveClient {
    /// Create a client. No socket is opened until `connect` or a send.
    pub fn new(config: GeminiLiveConfig) -> RealtimeResult<Self> {
        config.validate()?;
        let url = config.build_websocket_url()?;
        let (events, event_receiver) = mpsc::unbounded_channel();

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                url,
                machine: Mutex::new(Machine::default()),
                events,
                event_receiver: Mutex::new(Some(event_receiver)),
            }),
        })
    }

    /// Client name used in log lines.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// The session configuration.
    pub fn config(&self) -> &GeminiLiveConfig {
        &self.inner.config
    }

    /// Take the event receiver. Only the first call returns it.
    pub fn take_events(&self) -> Option<EventReceiver> {
        self.inner.event_receiver.lock().take()
    }

    /// Whether the socket is open and setup was sent.
    pub fn is_ready(&self) -> bool {
        self.inner.machine.lock().is_ready()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.machine.lock().state
    }

    /// Reconnect attempts made since the last successful setup.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.machine.lock().attempt
    }

    /// Open the session.
    ///
    /// Returns immediately when already open. While an attempt is in flight,
    /// every caller awaits that same attempt.
    pub async fn connect(&self) -> RealtimeResult<()> {
        let pending = {
            let mut machine = self.inner.machine.lock();
            if machine.is_ready() {
                debug!("{} already has an open connection", self.name());
                return Ok(());
            }

            let in_flight = match machine.state {
                ConnectionState::Connecting | ConnectionState::Reconnecting => {
                    machine.pending.as_ref().map(|p| p.future.clone())
                }
                _ => None,
            };

            match in_flight {
                Some(pending) => {
                    debug!("{} connection already in progress", self.name());
                    pending
                }
                None => {
                    machine.attempt = 0;
                    machine.terminal = false;
                    self.inner.start_attempt(&mut machine)
                }
            }
        };

        pending.await
    }

    /// Close the session with a normal-closure frame. No reconnection follows.
    pub fn disconnect(&self) {
        let (sink, task) = {
            let mut machine = self.inner.machine.lock();
            machine.generation += 1;
            if let Some(handle) = machine.reconnect_task.take() {
                handle.abort();
            }
            if let Some(pending) = machine.pending.take() {
                let _ = pending.resolver.send(Err(RealtimeError::ConnectionFailed(
                    CLIENT_CLOSE_REASON.to_string(),
                )));
            }
            machine.state = ConnectionState::Closed;
            (machine.sink.take(), machine.connection_task.take())
        };

        match (sink, task) {
            (Some(sink), task) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(close_socket(sink, task));
                }
                Err(_) => {
                    warn!("{} disconnect outside a runtime, dropping socket", self.name());
                    if let Some(task) = task {
                        task.abort();
                    }
                }
            },
            (None, Some(task)) => task.abort(),
            (None, None) => {}
        }

        info!("{} successfully disconnected from websocket", self.name());
    }

    /// Send a command through the readiness gate.
    ///
    /// When the socket is not ready this waits for the attempt in flight, or
    /// starts one. Write failures are returned, never retried.
    pub async fn send(&self, msg: ClientMessage) -> RealtimeResult<()> {
        let waiting = {
            let mut machine = self.inner.machine.lock();
            if machine.is_ready() {
                None
            } else if let Some(pending) = &machine.pending {
                debug!("{} connection in progress, waiting", self.name());
                Some(pending.future.clone())
            } else {
                warn!("{} WebSocket not ready, attempting to reconnect", self.name());
                Some(self.inner.start_attempt(&mut machine))
            }
        };

        if let Some(pending) = waiting
            && let Err(e) = pending.await
        {
            error!("{} failed to send {}: {e}", self.name(), msg.kind());
            return Err(e);
        }

        let sink = {
            let machine = self.inner.machine.lock();
            if machine.is_ready() {
                machine.sink.clone()
            } else {
                None
            }
        };
        let Some(sink) = sink else {
            error!(
                "{} WebSocket is not open after reconnection attempt, {} not sent",
                self.name(),
                msg.kind()
            );
            return Err(RealtimeError::NotConnected);
        };

        self.inner.write(&sink, &msg).await.inspect_err(|e| {
            error!("{} failed to send {}: {e}", self.name(), msg.kind());
        })
    }

    /// Send a base64 encoded PCM audio chunk.
    pub async fn send_audio(&self, base64_audio: &str) -> RealtimeResult<()> {
        self.send(ClientMessage::audio(base64_audio)).await?;
        trace!("Sending audio chunk to {}", self.name());
        Ok(())
    }

    /// Send a base64 encoded JPEG frame.
    pub async fn send_image(&self, base64_image: &str) -> RealtimeResult<()> {
        self.send(ClientMessage::image(base64_image)).await?;
        debug!(
            "Image with a size of {} KB was sent to {}",
            base64_image.len() / 1024,
            self.name()
        );
        Ok(())
    }

    /// Send a user text turn and end the turn.
    pub async fn send_text(&self, text: &str) -> RealtimeResult<()> {
        self.send_text_with_turn(text, true).await
    }

    /// Send a user text turn. With `end_of_turn` false the model waits for
    /// more input before responding.
    pub async fn send_text_with_turn(&self, text: &str, end_of_turn: bool) -> RealtimeResult<()> {
        self.send(ClientMessage::text(text, end_of_turn)).await?;
        debug!("Text sent to {}: {text}", self.name());
        Ok(())
    }

    /// Send the result of a tool call.
    ///
    /// Invalid input is rejected before any connection attempt.
    pub async fn send_tool_response(&self, response: ToolResponseInput) -> RealtimeResult<()> {
        let msg = ClientMessage::tool_response(response)?;
        self.send(msg).await?;
        debug!("Tool response sent to {}", self.name());
        Ok(())
    }
}

/// Send the normal-closure frame, then give the reader a moment to observe the
/// server's reply before tearing it down.
async fn close_socket(sink: SharedSink, task: Option<JoinHandle<()>>) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: CLIENT_CLOSE_REASON.to_string().into(),
    };
    if let Err(e) = sink.lock().await.send(Message::Close(Some(frame))).await {
        warn!("Error closing WebSocket: {e}");
    }

    if let Some(mut task) = task
        && tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err()
    {
        task.abort();
    }
}

#[async_trait]
impl BaseRealtime for GeminiLiveClient {
    async fn connect(&self) -> RealtimeResult<()> {
        GeminiLiveClient::connect(self).await
    }

    fn disconnect(&self) {
        GeminiLiveClient::disconnect(self)
    }

    fn is_ready(&self) -> bool {
        GeminiLiveClient::is_ready(self)
    }

    fn get_connection_state(&self) -> ConnectionState {
        self.connection_state()
    }

    fn take_events(&self) -> Option<EventReceiver> {
        GeminiLiveClient::take_events(self)
    }

    async fn send_audio(&self, base64_audio: &str) -> RealtimeResult<()> {
        GeminiLiveClient::send_audio(self, base64_audio).await
    }

    async fn send_image(&self, base64_image: &str) -> RealtimeResult<()> {
        GeminiLiveClient::send_image(self, base64_image).await
    }

    async fn send_text(&self, text: &str) -> RealtimeResult<()> {
        GeminiLiveClient::send_text(self, text).await
    }

    async fn send_tool_response(&self, response: ToolResponseInput) -> RealtimeResult<()> {
        GeminiLiveClient::send_tool_response(self, response).await
    }

    fn get_provider_info(&self) -> serde_json::Value {
        serde_json::json!({
            "provider": "gemini",
            "api_type": "WebSocket BidiGenerateContent",
            "endpoint": self.config().redacted_url(),
            "model": self.config().model_path(),
            "input_mime_types": ["audio/pcm", "image/jpeg"],
            "reconnection": {
                "enabled": self.config().reconnection.enabled,
                "max_attempts": self.config().reconnection.max_attempts,
                "initial_delay_ms": self.config().reconnection.initial_delay_ms,
            },
            "features": {
                "bidirectional_audio": true,
                "video_frames": true,
                "function_calling": true,
                "interruption": true
            },
            "documentation": "https://ai.google.dev/api/multimodal-live"
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
