//! Wire protocol for the hall and room WebSocket channels.
//!
//! Every frame is a flat JSON object discriminated by its `optype` field.
//! The enums here are internally tagged on `optype` so the serialized
//! shape matches what the browser client sends and expects.

pub mod messages;

pub use messages::{
    ErrorReply, HallReply, HallRequest, RoomReply, RoomRequest, INVALID_COORD, NO_WINNER,
};

use serde::Serialize;
use std::sync::Arc;

/// Serialize a protocol message into a sendable text frame.
///
/// The message types in this module cannot fail to serialize; if one ever
/// does, an error envelope is substituted so the peer is never left
/// waiting on a frame that silently vanished.
pub fn encode<T: Serialize>(message: &T) -> Arc<str> {
    match serde_json::to_string(message) {
        Ok(body) => Arc::from(body),
        Err(err) => {
            tracing::error!(error = %err, "Failed to serialize protocol message");
            Arc::from(r#"{"result":false,"reason":"internal error"}"#)
        }
    }
}
