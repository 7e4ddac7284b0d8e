//! Realtime envelopes exchanged over the chat socket.
//!
//! Frames are JSON objects tagged by event name: `{"event": ..., "data": ...}`.
//! Event names (`joinRoom`, `sendMessage`, `receiveMessage`) are part of the
//! backend contract.

use crate::{ChatMessage, ProtocolError, Result, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// Events the client emits to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Subscribe to live inserts for a room. Data is the bare room id.
    #[serde(rename = "joinRoom")]
    JoinRoom(RoomId),
    #[serde(rename = "sendMessage")]
    SendMessage(OutgoingMessage),
}

/// Payload of a `sendMessage` emit. The backend expects empty strings,
/// not nulls, for an absent body or attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    /// Body text; empty when sending an attachment-only message.
    pub message: String,
    /// Uploaded attachment URL; empty when sending plain text.
    pub file_url: String,
}

/// Events the server pushes to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "receiveMessage")]
    ReceiveMessage(ChatMessage),
}

impl ClientEvent {
    pub fn to_frame(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

impl ServerEvent {
    pub fn from_frame(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(ProtocolError::Decode)
    }
}
