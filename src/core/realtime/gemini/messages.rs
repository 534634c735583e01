//! Gemini Live WebSocket message types.
//!
//! # Protocol Overview
//!
//! Client messages (sent to server), one top-level key each:
//! - `setup` - session configuration, first frame after open
//! - `realtimeInput` - streamed media chunks (audio, video frames)
//! - `clientContent` - conversation turns
//! - `toolResponse` - results of tool calls
//!
//! Server messages (received from server):
//! - `setupComplete` - setup acknowledged
//! - `serverContent` - model turn parts, turn boundaries, interruption
//! - `toolCall` - function calls requested by the model
//! - `toolCallCancellation` - previously requested calls withdrawn
//!
//! Server frames usually arrive as binary WebSocket messages containing JSON.

use serde::{Deserialize, Serialize};

use crate::core::realtime::base::{
    ModelTurn, Part, RealtimeError, RealtimeResult, ToolCall, ToolCallCancellation,
    ToolResponseInput,
};

/// MIME type of microphone audio sent upstream.
pub const AUDIO_PCM_MIME_TYPE: &str = "audio/pcm";

/// MIME type of camera frames sent upstream.
pub const IMAGE_JPEG_MIME_TYPE: &str = "image/jpeg";

// =============================================================================
// Client Messages (sent to server)
// =============================================================================

/// One media chunk of realtime input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    /// MIME type of the payload
    pub mime_type: String,
    /// Base64 encoded payload
    pub data: String,
}

/// Streamed media input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    /// Media chunks
    pub media_chunks: Vec<MediaChunk>,
}

/// A conversation turn sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker role, `user` for client turns
    pub role: String,
    /// Turn parts
    pub parts: Vec<Part>,
}

/// Conversation content input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    /// Turns to append
    pub turns: Vec<Turn>,
    /// Whether the model should respond now
    pub turn_complete: bool,
}

/// Outcome of a tool call: exactly one of output or error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionResult {
    /// Tool output
    Output(serde_json::Value),
    /// Tool failure message
    Error(String),
}

/// Response to one function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Call id being answered
    pub id: String,
    /// Outcome
    pub response: FunctionResult,
}

/// Tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    /// One entry per answered call
    pub function_responses: Vec<FunctionResponse>,
}

/// Messages sent to the Gemini Live API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Session configuration
    Setup(serde_json::Value),
    /// Streamed media
    RealtimeInput(RealtimeInput),
    /// Conversation turns
    ClientContent(ClientContent),
    /// Tool results
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    /// Setup frame carrying the session configuration.
    pub fn setup(config: serde_json::Value) -> Self {
        ClientMessage::Setup(config)
    }

    /// Single-chunk realtime input.
    pub fn media(mime_type: &str, base64_data: &str) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type: mime_type.to_string(),
                data: base64_data.to_string(),
            }],
        })
    }

    /// PCM audio chunk.
    pub fn audio(base64_audio: &str) -> Self {
        Self::media(AUDIO_PCM_MIME_TYPE, base64_audio)
    }

    /// JPEG frame.
    pub fn image(base64_image: &str) -> Self {
        Self::media(IMAGE_JPEG_MIME_TYPE, base64_image)
    }

    /// One user turn with a single text part.
    pub fn text(text: &str, end_of_turn: bool) -> Self {
        ClientMessage::ClientContent(ClientContent {
            turns: vec![Turn {
                role: "user".to_string(),
                parts: vec![Part::text(text)],
            }],
            turn_complete: end_of_turn,
        })
    }

    /// Validate a tool result and build its response frame.
    ///
    /// An error, when present, is sent alone; otherwise an output is required.
    pub fn tool_response(input: ToolResponseInput) -> RealtimeResult<Self> {
        let id = match input.id {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(RealtimeError::Validation(
                    "Tool response must include an id".to_string(),
                ));
            }
        };

        let response = match (input.error, input.output) {
            (Some(error), _) if !error.is_empty() => FunctionResult::Error(error),
            (_, Some(output)) => FunctionResult::Output(output),
            (_, None) => {
                return Err(RealtimeError::Validation(
                    "Tool response must include an output when no error is provided".to_string(),
                ));
            }
        };

        Ok(ClientMessage::ToolResponse(ToolResponse {
            function_responses: vec![FunctionResponse { id, response }],
        }))
    }

    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Setup(_) => "setup",
            ClientMessage::RealtimeInput(_) => "realtimeInput",
            ClientMessage::ClientContent(_) => "clientContent",
            ClientMessage::ToolResponse(_) => "toolResponse",
        }
    }
}

/// Serialize a client message to JSON text.
pub fn encode_client_message(msg: &ClientMessage) -> RealtimeResult<String> {
    serde_json::to_string(msg).map_err(|e| RealtimeError::SerializationError(e.to_string()))
}

// =============================================================================
// Server Messages (received from server)
// =============================================================================

/// Server content payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    /// The model turn was interrupted by user activity
    #[serde(default)]
    pub interrupted: bool,
    /// The model finished its turn
    #[serde(default)]
    pub turn_complete: bool,
    /// Content produced by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<ModelTurn>,
}

/// Raw shape of a server frame before classification.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServerMessage {
    tool_call: Option<ToolCall>,
    tool_call_cancellation: Option<ToolCallCancellation>,
    server_content: Option<ServerContent>,
    setup_complete: Option<serde_json::Value>,
}

/// Messages received from the Gemini Live API.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Tool invocation request
    ToolCall(ToolCall),
    /// Tool invocation cancellation
    ToolCallCancellation(ToolCallCancellation),
    /// Model content and turn signals
    ServerContent(ServerContent),
    /// Setup acknowledged
    SetupComplete,
    /// Valid JSON without a recognized key
    Unrecognized(serde_json::Value),
}

/// Decode one inbound frame.
///
/// Keys are checked in precedence order: `toolCall`, `toolCallCancellation`,
/// `serverContent`, `setupComplete`.
pub fn decode_server_message(payload: &[u8]) -> RealtimeResult<ServerMessage> {
    let value: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| RealtimeError::SerializationError(format!("invalid JSON frame: {e}")))?;

    if !value.is_object() {
        return Ok(ServerMessage::Unrecognized(value));
    }

    let raw: RawServerMessage = serde_json::from_value(value.clone())
        .map_err(|e| RealtimeError::SerializationError(format!("malformed frame: {e}")))?;

    let msg = if let Some(call) = raw.tool_call {
        ServerMessage::ToolCall(call)
    } else if let Some(cancellation) = raw.tool_call_cancellation {
        ServerMessage::ToolCallCancellation(cancellation)
    } else if let Some(content) = raw.server_content {
        ServerMessage::ServerContent(content)
    } else if raw.setup_complete.is_some() {
        ServerMessage::SetupComplete
    } else {
        ServerMessage::Unrecognized(value)
    };

    Ok(msg)
}
