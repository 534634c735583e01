//! WebSocket Mock Server for the Gemini Live API
//!
//! Records every client frame, answers `clientContent` with scripted server
//! frames, and can drop connections or stop listening to exercise reconnects.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// How the mock server treats its connections.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Frames sent (as binary messages) in reply to every `clientContent`
    pub replies: Vec<Value>,
    /// Acknowledge the setup frame with `setupComplete`
    pub setup_complete: bool,
    /// Number of first connections dropped right after their setup frame
    pub drop_after_setup: u64,
    /// Stop listening after this many connections
    pub max_connections: Option<u64>,
    /// Connections after this many are accepted but never upgraded
    pub handshake_after: Option<u64>,
    /// Push a text `serverContent` frame at this interval after setup
    pub stream_interval: Option<Duration>,
}

impl MockBehavior {
    /// Keep every connection open and acknowledge setup.
    pub fn stable() -> Self {
        Self {
            setup_complete: true,
            ..Default::default()
        }
    }

    /// Reply to each text turn with the given frames.
    pub fn with_replies(mut self, replies: Vec<Value>) -> Self {
        self.replies = replies;
        self
    }

    /// Drop the first `count` connections after setup.
    pub fn dropping_first(mut self, count: u64) -> Self {
        self.drop_after_setup = count;
        self
    }

    /// Stall the WebSocket handshake of every connection after the first `count`.
    pub fn stalling_after(mut self, count: u64) -> Self {
        self.handshake_after = Some(count);
        self
    }

    /// Stream model text continuously once setup arrives.
    pub fn streaming_every(mut self, interval: Duration) -> Self {
        self.stream_interval = Some(interval);
        self
    }

    /// Refuse connections after the first `count`.
    pub fn accepting_only(mut self, count: u64) -> Self {
        self.max_connections = Some(count);
        self
    }
}

/// WebSocket Mock Server State
#[derive(Default)]
pub struct MockLiveState {
    pub behavior: MockBehavior,
    pub connection_count: AtomicU64,
    /// Every JSON frame received, in arrival order across connections
    pub received: Mutex<Vec<Value>>,
    /// Close frames received from clients as (code, reason)
    pub close_frames: Mutex<Vec<(u16, String)>>,
}

impl MockLiveState {
    pub fn connections(&self) -> u64 {
        self.connection_count.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    /// Received frames whose top-level key is `kind`.
    pub fn received_of(&self, kind: &str) -> Vec<Value> {
        self.received
            .lock()
            .iter()
            .filter_map(|frame| frame.get(kind).cloned())
            .collect()
    }
}

/// A running mock server bound to an ephemeral loopback port.
pub struct MockLiveServer {
    pub addr: SocketAddr,
    pub state: Arc<MockLiveState>,
    task: JoinHandle<()>,
}

impl MockLiveServer {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockLiveState {
            behavior,
            ..Default::default()
        });
        let task = tokio::spawn(accept_loop(listener, Arc::clone(&state)));
        Self { addr, state, task }
    }

    /// WebSocket URL of this server.
    pub fn url(&self) -> String {
        format!("ws://{}/ws/BidiGenerateContent", self.addr)
    }
}

impl Drop for MockLiveServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<MockLiveState>) {
    let mut stalled = Vec::new();
    while let Ok((stream, _)) = listener.accept().await {
        let conn_id = state.connection_count.fetch_add(1, Ordering::SeqCst) + 1;
        if state.behavior.handshake_after.is_some_and(|n| conn_id > n) {
            // Hold the TCP stream open without answering the upgrade
            stalled.push(stream);
            continue;
        }
        let conn_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, conn_state, conn_id).await {
                eprintln!("Mock connection {conn_id} ended with error: {e}");
            }
        });

        if state.behavior.max_connections.is_some_and(|max| conn_id >= max) {
            // Dropping the listener makes later connects fail with "refused"
            break;
        }
    }
}

/// Handle a single Gemini Live session
async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockLiveState>,
    conn_id: u64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let frame: Value = serde_json::from_str(&text)?;
                state.received.lock().push(frame.clone());

                if frame.get("setup").is_some() {
                    if state.behavior.setup_complete {
                        let ack = json!({ "setupComplete": {} });
                        write.send(Message::Binary(ack.to_string().into())).await?;
                    }
                    if conn_id <= state.behavior.drop_after_setup {
                        // Abrupt drop without a close handshake
                        return Ok(());
                    }
                    if let Some(interval) = state.behavior.stream_interval {
                        // Never reads again; ends once the client goes away
                        let chunk = json!({
                            "serverContent": { "modelTurn": { "parts": [{ "text": "tick" }] } }
                        });
                        loop {
                            tokio::time::sleep(interval).await;
                            write.send(Message::Binary(chunk.to_string().into())).await?;
                        }
                    }
                } else if frame.get("clientContent").is_some() {
                    for reply in &state.behavior.replies {
                        write.send(Message::Binary(reply.to_string().into())).await?;
                    }
                }
            }
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    state
                        .close_frames
                        .lock()
                        .push((u16::from(frame.code), frame.reason.as_str().to_string()));
                }
                break;
            }
            Ok(Message::Ping(data)) => {
                write.send(Message::Pong(data)).await?;
            }
            Err(e) => {
                eprintln!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// A TCP listener that accepts connections but never answers the handshake.
pub async fn spawn_silent_listener() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    (addr, task)
}
