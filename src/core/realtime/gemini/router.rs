//! Classification of decoded server messages into emitted events.

use base64::prelude::*;
use bytes::Bytes;
use tracing::{debug, trace, warn};

use super::messages::{ServerContent, ServerMessage};
use crate::core::realtime::base::{LiveEvent, ModelTurn, Part};

/// Route one decoded server message into the events it produces, in emission
/// order.
///
/// Interruption wins over everything else in the same frame. A turn-complete
/// signal is emitted before the content of a model turn carried alongside it.
pub fn route_server_message(name: &str, msg: ServerMessage) -> Vec<LiveEvent> {
    match msg {
        ServerMessage::ToolCall(call) => {
            debug!("{name} received tool call: {} call(s)", call.function_calls.len());
            vec![LiveEvent::ToolCall(call)]
        }
        ServerMessage::ToolCallCancellation(cancellation) => {
            debug!("{name} received tool call cancellation: {:?}", cancellation.ids);
            vec![LiveEvent::ToolCallCancellation(cancellation)]
        }
        ServerMessage::ServerContent(content) => route_server_content(name, content),
        ServerMessage::SetupComplete => {
            debug!("{name} setup acknowledged by server");
            Vec::new()
        }
        ServerMessage::Unrecognized(value) => {
            debug!("{name} received unmatched message: {value}");
            Vec::new()
        }
    }
}

fn route_server_content(name: &str, content: ServerContent) -> Vec<LiveEvent> {
    if content.interrupted {
        debug!("{name} is interrupted");
        return vec![LiveEvent::Interrupted];
    }

    let mut events = Vec::new();

    if content.turn_complete {
        debug!("{name} has completed its turn");
        events.push(LiveEvent::TurnComplete);
    }

    if let Some(turn) = content.model_turn {
        let (audio, other): (Vec<Part>, Vec<Part>) = turn
            .parts
            .into_iter()
            .partition(|part| part.as_audio().is_some());

        for part in &audio {
            let Some(inline) = part.as_audio() else {
                continue;
            };
            if inline.data.is_empty() {
                trace!("{name} skipped empty audio part");
                continue;
            }
            match BASE64_STANDARD.decode(&inline.data) {
                Ok(bytes) => events.push(LiveEvent::Audio(Bytes::from(bytes))),
                Err(e) => warn!("{name} failed to decode audio part: {e}"),
            }
        }

        if !other.is_empty() {
            trace!("{name} emitting {} content part(s)", other.len());
            events.push(LiveEvent::Content(ModelTurn { parts: other }));
        }
    }

    events
}
