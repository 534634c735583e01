//! Gemini Multimodal Live API module.
//!
//! This module provides a self-healing bidirectional streaming session with
//! Google's Gemini Live endpoint.
//!
//! # Features
//!
//! - Streaming microphone audio and camera frames
//! - Text turns and tool (function) responses
//! - Spoken responses decoded into raw PCM chunks
//! - Automatic reconnection with exponential backoff
//! - Sends made while disconnected wait for the connection instead of failing
//!
//! # Audio Format
//!
//! Input audio is 16-bit PCM (`audio/pcm`). Output audio arrives as base64
//! `audio/pcm` parts, typically at 24kHz, and is emitted as decoded bytes.
//!
//! # Example
//!
//! ```rust,ignore
//! use gemini_live_client::core::realtime::gemini::{GeminiLiveClient, GeminiLiveConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = GeminiLiveConfig::new("your-api-key")
//!         .with_system_instruction("You are a helpful assistant.");
//!
//!     let client = GeminiLiveClient::new(config).unwrap();
//!     let mut events = client.take_events().unwrap();
//!
//!     client.connect().await.unwrap();
//!     client.send_audio(&base64_chunk).await.unwrap();
//! }
//! ```

mod client;
mod config;
pub mod messages;
mod router;

pub use client::{CLIENT_CLOSE_REASON, GeminiLiveClient};
pub use config::{
    DEFAULT_CLIENT_NAME, DEFAULT_CONNECTION_TIMEOUT_MS, GEMINI_DEFAULT_MODEL, GEMINI_LIVE_URL,
    GeminiLiveConfig, ResponseModality,
};
pub use messages::{
    AUDIO_PCM_MIME_TYPE, ClientMessage, IMAGE_JPEG_MIME_TYPE, ServerContent, ServerMessage,
    decode_server_message, encode_client_message,
};
pub use router::route_server_message;
