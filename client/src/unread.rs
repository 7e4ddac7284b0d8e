//! Per-room read markers and unread badge counts.
//!
//! A marker is the timestamp below which messages count as seen; with no
//! marker, every other-party message is unread. Live arrivals for rooms
//! that are not open increment an in-memory counter instead of refetching
//! history. Markers persist via [`crate::storage::Storage`]; counters are
//! derived state and never persisted.

use chrono::{DateTime, Utc};
use healthlink_protocol::{ChatMessage, RoomId, UserId};
use std::collections::HashMap;

#[derive(Debug)]
pub struct UnreadTracker {
    me: UserId,
    markers: HashMap<RoomId, DateTime<Utc>>,
    counts: HashMap<RoomId, usize>,
}

impl UnreadTracker {
    pub fn new(me: UserId) -> Self {
        Self::with_markers(me, HashMap::new())
    }

    /// Resume from persisted markers.
    pub fn with_markers(me: UserId, markers: HashMap<RoomId, DateTime<Utc>>) -> Self {
        Self {
            me,
            markers,
            counts: HashMap::new(),
        }
    }

    /// Mark a room read now. Called when its conversation is opened.
    pub fn mark_read(&mut self, room: &RoomId) {
        self.markers.insert(room.clone(), Utc::now());
        self.counts.insert(room.clone(), 0);
    }

    /// Recompute a room's badge from fetched history.
    pub fn seed(&mut self, room: &RoomId, history: &[ChatMessage]) {
        let marker = self.markers.get(room).copied();
        let count = history
            .iter()
            .filter(|m| m.sender_id != self.me)
            .filter(|m| marker.is_none_or(|at| m.created_at > at))
            .count();
        self.counts.insert(room.clone(), count);
    }

    /// Record one live message. Returns true when it incremented the badge,
    /// i.e. an other-party message for a room that is not open. Messages
    /// for the open room keep it read by advancing the marker.
    pub fn record_live(&mut self, msg: &ChatMessage, open_room: Option<&RoomId>) -> bool {
        if msg.sender_id == self.me {
            return false;
        }
        if open_room == Some(&msg.room_id) {
            self.markers.insert(msg.room_id.clone(), Utc::now());
            return false;
        }
        *self.counts.entry(msg.room_id.clone()).or_insert(0) += 1;
        true
    }

    pub fn unread_count(&self, room: &RoomId) -> usize {
        self.counts.get(room).copied().unwrap_or(0)
    }

    pub fn last_read_at(&self, room: &RoomId) -> Option<DateTime<Utc>> {
        self.markers.get(room).copied()
    }

    /// All markers, for persistence.
    pub fn markers(&self) -> &HashMap<RoomId, DateTime<Utc>> {
        &self.markers
    }
}
