//! Base traits and types for realtime multimodal providers.
//!
//! This module defines the foundational abstractions for providers that keep a
//! persistent bidirectional session open: the error taxonomy, the reconnection
//! (backoff) policy, the connection state, the content model shared by inbound
//! frames and emitted events, and the `BaseRealtime` trait.
//!
//! # Events
//!
//! Providers do not take listener callbacks. Every inbound frame is routed into
//! zero or more [`LiveEvent`] values delivered over a tokio channel, so
//! consumers match on a typed enum instead of registering one closure per kind.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
///
/// `Clone` is required because a single connection attempt result is shared by
/// every caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The socket closed before the connection attempt completed
    #[error("WebSocket closed during connection: {0}")]
    ClosedDuringConnection(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Caller supplied arguments that cannot be sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Reconnection Policy
// =============================================================================

/// Configuration for automatic reconnection behavior.
///
/// The delay before retry `n` (1-based) is
/// `initial_delay_ms * backoff_multiplier^(n - 1)`, capped at `max_delay_ms`.
/// With the defaults this yields 1000, 2000 and 4000 ms, after which the
/// client gives up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectionConfig {
    /// Enable automatic reconnection on connection loss.
    /// Default: true
    pub enabled: bool,

    /// Maximum number of reconnection attempts before giving up.
    /// Default: 3
    pub max_attempts: u32,

    /// Delay before the first reconnection attempt (milliseconds).
    /// Default: 1000ms
    pub initial_delay_ms: u64,

    /// Maximum delay between reconnection attempts (milliseconds).
    /// Default: 30000ms
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff.
    /// Default: 2.0
    pub backoff_multiplier: f32,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectionConfig {
    /// Create a config with reconnection disabled.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number using exponential backoff.
    /// Returns the delay in milliseconds. Attempt numbers start at 1.
    pub fn calculate_delay(&self, attempt: u32) -> u64 {
        let base_delay = self.initial_delay_ms as f64;
        let multiplier = self.backoff_multiplier as f64;

        let delay = base_delay * multiplier.powi(attempt.saturating_sub(1) as i32);
        delay.min(self.max_delay_ms as f64) as u64
    }

    /// Delay for the given attempt as a `Duration`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.calculate_delay(attempt))
    }

    /// Check if another reconnection attempt is allowed after `attempt`
    /// attempts have already been made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && attempt < self.max_attempts
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection has been attempted yet
    #[default]
    Idle,
    /// A connection attempt is in flight
    Connecting,
    /// Socket open and setup sent
    Open,
    /// Waiting for the backoff delay before the next attempt
    Reconnecting,
    /// Closed, either on request or after giving up
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Reconnecting => write!(f, "Reconnecting"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

// =============================================================================
// Content Model
// =============================================================================

/// Inline binary payload of a content part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type, e.g. `audio/pcm;rate=24000`
    pub mime_type: String,
    /// Base64 encoded payload
    #[serde(default)]
    pub data: String,
}

impl InlineData {
    /// Whether this payload is raw PCM audio.
    pub fn is_pcm_audio(&self) -> bool {
        self.mime_type.starts_with("audio/pcm")
    }
}

/// Atomic unit of content within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    /// Inline binary data with a MIME type
    InlineData {
        /// The payload
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    /// Plain text
    Text {
        /// The text
        text: String,
    },
    /// Any other part shape, kept verbatim
    Other(serde_json::Value),
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Create an inline data part.
    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    /// Returns the inline payload when this part carries PCM audio.
    pub fn as_audio(&self) -> Option<&InlineData> {
        match self {
            Part::InlineData { inline_data } if inline_data.is_pcm_audio() => Some(inline_data),
            _ => None,
        }
    }
}

/// A server-emitted turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTurn {
    /// Content parts in server order
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl ModelTurn {
    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A single function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Call identifier to echo back in the tool response
    #[serde(default)]
    pub id: String,
    /// Function name
    pub name: String,
    /// JSON arguments
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Tool invocation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Requested calls
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

/// Cancellation of previously requested tool calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallCancellation {
    /// Ids of the cancelled calls
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Result of a tool execution, as supplied by the caller.
///
/// `output` may be any JSON value including `null`; it is only absent when
/// the field itself is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResponseInput {
    /// Call id from [`FunctionCall::id`]
    #[serde(default)]
    pub id: Option<String>,
    /// Tool output
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// Error message when the tool failed
    #[serde(default)]
    pub error: Option<String>,
}

impl ToolResponseInput {
    /// A successful tool result.
    pub fn output(id: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            id: Some(id.into()),
            output: Some(output),
            error: None,
        }
    }

    /// A failed tool result.
    pub fn error(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            output: None,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Events emitted by a realtime session.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// One decoded audio chunk
    Audio(Bytes),
    /// Non-audio parts of a model turn (never empty)
    Content(ModelTurn),
    /// The model finished its turn
    TurnComplete,
    /// The model turn was interrupted
    Interrupted,
    /// The model requests tool invocations
    ToolCall(ToolCall),
    /// The model cancelled tool invocations
    ToolCallCancellation(ToolCallCancellation),
    /// An unclean close happened and a retry is scheduled
    Reconnecting {
        /// 1-based retry number
        attempt: u32,
        /// Backoff delay before the retry
        delay: Duration,
    },
    /// Reconnection attempts are exhausted; call `connect` to recover
    Disconnected,
}

/// Sending half of the event channel.
pub type EventSender = mpsc::UnboundedSender<LiveEvent>;

/// Receiving half of the event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<LiveEvent>;

// =============================================================================
// Base Trait
// =============================================================================

/// Base trait for realtime multimodal providers.
///
/// All operations take `&self`: providers are shared between the task that
/// pushes media and the task that consumes events.
///
/// # Example
///
/// ```rust,ignore
/// use gemini_live_client::core::realtime::{create_realtime_provider, LiveEvent};
///
/// let provider = create_realtime_provider("gemini", config)?;
/// let mut events = provider.take_events().expect("events taken once");
/// provider.connect().await?;
/// provider.send_text("Hello").await?;
///
/// while let Some(event) = events.recv().await {
///     if let LiveEvent::Content(turn) = event {
///         println!("{turn:?}");
///     }
/// }
/// ```
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Connect to the provider and perform the setup handshake.
    async fn connect(&self) -> RealtimeResult<()>;

    /// Close the session. No reconnection follows.
    fn disconnect(&self);

    /// Check if the provider is connected and ready.
    fn is_ready(&self) -> bool;

    /// Get the current connection state.
    fn get_connection_state(&self) -> ConnectionState;

    /// Take the event receiver. Returns `None` after the first call.
    fn take_events(&self) -> Option<EventReceiver>;

    // -------------------------------------------------------------------------
    // Media and text input
    // -------------------------------------------------------------------------

    /// Send a base64 encoded PCM audio chunk.
    async fn send_audio(&self, base64_audio: &str) -> RealtimeResult<()>;

    /// Send a base64 encoded JPEG frame.
    async fn send_image(&self, base64_image: &str) -> RealtimeResult<()>;

    /// Send a user text turn and end the turn.
    async fn send_text(&self, text: &str) -> RealtimeResult<()>;

    /// Send the result of a tool call.
    async fn send_tool_response(&self, response: ToolResponseInput) -> RealtimeResult<()>;

    /// Get provider information.
    fn get_provider_info(&self) -> serde_json::Value;
}

/// Boxed trait object for realtime providers.
pub type BoxedRealtime = Box<dyn BaseRealtime>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        assert_eq!(ConnectionState::Idle.to_string(), "Idle");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "Reconnecting");
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }

    #[test]
    fn test_error_display() {
        let err = RealtimeError::ConnectionFailed("test".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = RealtimeError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");

        let err = RealtimeError::Validation("missing id".to_string());
        assert_eq!(err.to_string(), "Validation error: missing id");
    }

    #[test]
    fn test_reconnection_config_default() {
        let config = ReconnectionConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30000);
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_default_backoff_delays() {
        let config = ReconnectionConfig::default();

        assert_eq!(config.calculate_delay(1), 1000);
        assert_eq!(config.calculate_delay(2), 2000);
        assert_eq!(config.calculate_delay(3), 4000);
        assert_eq!(config.delay_for(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_no_fourth_attempt() {
        let config = ReconnectionConfig::default();

        assert!(config.should_retry(0));
        assert!(config.should_retry(1));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));
        assert!(!config.should_retry(10));
    }

    #[test]
    fn test_reconnection_disabled() {
        let config = ReconnectionConfig::disabled();
        assert!(!config.enabled);
        assert!(!config.should_retry(0));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = ReconnectionConfig {
            max_attempts: 10,
            ..Default::default()
        };

        assert_eq!(config.calculate_delay(5), 16000);
        assert_eq!(config.calculate_delay(6), 30000);
        assert_eq!(config.calculate_delay(9), 30000);
    }

    #[test]
    fn test_part_untagged_decoding() {
        let audio: Part = serde_json::from_value(serde_json::json!({
            "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAA=" }
        }))
        .unwrap();
        assert!(audio.as_audio().is_some());

        let image: Part = serde_json::from_value(serde_json::json!({
            "inlineData": { "mimeType": "image/png", "data": "AAA=" }
        }))
        .unwrap();
        assert!(image.as_audio().is_none());

        let text: Part = serde_json::from_value(serde_json::json!({ "text": "hi" })).unwrap();
        assert_eq!(text, Part::text("hi"));

        let other: Part =
            serde_json::from_value(serde_json::json!({ "executableCode": { "code": "1+1" } }))
                .unwrap();
        assert!(matches!(other, Part::Other(_)));
    }

    #[test]
    fn test_model_turn_text_skips_other_parts() {
        let turn = ModelTurn {
            parts: vec![
                Part::text("Hello, "),
                Part::inline("image/png", "AAAA"),
                Part::text("world"),
            ],
        };
        assert_eq!(turn.text(), "Hello, world");
        assert_eq!(ModelTurn::default().text(), "");
    }

    #[test]
    fn test_tool_response_input_constructors() {
        let ok = ToolResponseInput::output("call-1", serde_json::json!({"temp": 21}));
        assert_eq!(ok.id.as_deref(), Some("call-1"));
        assert!(ok.error.is_none());

        let failed = ToolResponseInput::error("call-2", "boom");
        assert!(failed.output.is_none());
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
