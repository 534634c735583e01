//! Mock Provider Servers
//!
//! In-process stand-ins for remote realtime endpoints:
//! - WebSocket (Gemini Live `BidiGenerateContent`)
//!
//! Includes failure elements:
//! - Connection drops right after the setup frame
//! - Listener shutdown so later reconnects are refused
//! - A TCP listener that never completes the WebSocket handshake
//! - Handshakes that stall after the first few connections
//! - A server that streams model output without reading

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod websocket_mock;

use std::time::Duration;

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
