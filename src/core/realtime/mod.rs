//! Realtime multimodal provider module.
//!
//! This module provides abstractions and implementations for persistent
//! bidirectional sessions that stream audio and video frames up and receive
//! model turns (spoken audio, text, tool calls) back.
//!
//! # Supported Providers
//!
//! - **Gemini Multimodal Live API** - audio, video frames, text and tools
//!
//! # Architecture
//!
//! - `BaseRealtime` trait for provider abstraction
//! - Factory function for dynamic provider creation
//! - Typed `LiveEvent` channel instead of per-event callbacks
//!
//! # Example
//!
//! ```rust,ignore
//! use gemini_live_client::core::realtime::{create_realtime_provider, GeminiLiveConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = GeminiLiveConfig::new("your-api-key");
//!     let provider = create_realtime_provider("gemini", config).unwrap();
//!
//!     let mut events = provider.take_events().unwrap();
//!     provider.connect().await.unwrap();
//!     provider.send_text("Hello").await.unwrap();
//! }
//! ```

mod base;
pub mod gemini;

pub use base::{
    BaseRealtime, BoxedRealtime, ConnectionState, EventReceiver, EventSender, FunctionCall,
    InlineData, LiveEvent, ModelTurn, Part, RealtimeError, RealtimeResult, ReconnectionConfig,
    ToolCall, ToolCallCancellation, ToolResponseInput,
};
pub use gemini::{
    GEMINI_DEFAULT_MODEL, GEMINI_LIVE_URL, GeminiLiveClient, GeminiLiveConfig, ResponseModality,
};

/// Supported realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeProvider {
    /// Gemini Multimodal Live API
    Gemini,
}

impl RealtimeProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "gemini-live" | "gemini_live" | "google" => Some(RealtimeProvider::Gemini),
            _ => None,
        }
    }
}

impl std::fmt::Display for RealtimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RealtimeProvider::Gemini => write!(f, "gemini"),
        }
    }
}

/// Factory function to create a realtime provider.
///
/// # Supported Providers
///
/// - `"gemini"` / `"gemini-live"` / `"google"` - Gemini Multimodal Live API
pub fn create_realtime_provider(
    provider_type: &str,
    config: GeminiLiveConfig,
) -> RealtimeResult<BoxedRealtime> {
    let provider = RealtimeProvider::parse(provider_type).ok_or_else(|| {
        RealtimeError::InvalidConfiguration(format!(
            "Unsupported realtime provider: '{provider_type}'. Supported providers: {}",
            get_supported_realtime_providers().join(", ")
        ))
    })?;
    create_realtime_provider_from_enum(provider, config)
}

/// Create a realtime provider from enum.
pub fn create_realtime_provider_from_enum(
    provider: RealtimeProvider,
    config: GeminiLiveConfig,
) -> RealtimeResult<BoxedRealtime> {
    match provider {
        RealtimeProvider::Gemini => Ok(Box::new(GeminiLiveClient::new(config)?)),
    }
}

/// Get list of supported realtime providers.
pub fn get_supported_realtime_providers() -> Vec<&'static str> {
    vec!["gemini"]
}
