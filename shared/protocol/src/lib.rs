//! Wire models shared across HealthLink chat clients.
//!
//! Everything here mirrors the backend's JSON contracts exactly; field
//! renames map the backend's camelCase (and Mongo-style `_id`) onto
//! idiomatic Rust names.

pub mod events;
pub mod rest;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-assigned identifier for a user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The addressable scope of a single doctor-patient conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Derive the room id for a participant pair.
    ///
    /// Order-independent: the two ids are sorted before joining, so both
    /// participants compute the same id regardless of which side is
    /// "self". A room id is computable before the room has any server-side
    /// representation.
    pub fn derive(a: &UserId, b: &UserId) -> Self {
        let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        Self(format!("{}_{}", lo.0, hi.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account role recognized by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

/// Authenticated user profile returned at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

/// A single chat message. Immutable once created; ordering is by
/// `created_at` with arrival order as the tie break.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    /// Body text; empty for attachment-only messages.
    #[serde(rename = "message", default)]
    pub text: String,
    /// Server-assigned URL of an uploaded attachment; empty for plain text.
    #[serde(rename = "fileUrl", default)]
    pub attachment_url: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn has_attachment(&self) -> bool {
        !self.attachment_url.is_empty()
    }
}

/// One entry in the "rooms for this user" listing. Display names are
/// denormalized server-side and cached by clients for labeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub doctor_id: UserId,
    pub doctor_name: String,
    pub patient_id: UserId,
    pub patient_name: String,
}

impl RoomSummary {
    /// The participant who is not `me`.
    pub fn other_party(&self, me: &UserId) -> (&UserId, &str) {
        if &self.doctor_id == me {
            (&self.patient_id, &self.patient_name)
        } else {
            (&self.doctor_id, &self.doctor_name)
        }
    }
}

/// Protocol-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode event: {0}")]
    Decode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
