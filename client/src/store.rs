//! In-memory message list for the open conversation.
//!
//! Hydrated from the history fetch, appended to on live receipt. Two
//! invariants hold for the rendered list: it is sorted non-decreasing by
//! `created_at` (arrival order breaks ties), and it contains each message
//! id at most once, so a message racing in through both the history fetch
//! and a live event renders once.

use healthlink_protocol::{ChatMessage, RoomId};
use std::collections::HashSet;

#[derive(Debug)]
pub struct MessageStore {
    room_id: RoomId,
    messages: Vec<ChatMessage>,
    seen: HashSet<String>,
}

impl MessageStore {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            messages: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Insert one message in timestamp order. Returns false for duplicates
    /// and for messages addressed to a different room.
    pub fn insert(&mut self, msg: ChatMessage) -> bool {
        if msg.room_id != self.room_id {
            return false;
        }
        if !self.seen.insert(msg.id.clone()) {
            return false;
        }
        // Upper bound keeps arrival order for equal timestamps.
        let pos = self
            .messages
            .partition_point(|m| m.created_at <= msg.created_at);
        self.messages.insert(pos, msg);
        true
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A conversation the user can have open. Rooms have no server-side
/// representation until their first message, but the id is computable
/// locally, so an empty conversation is a first-class state.
#[derive(Debug)]
pub enum Conversation {
    Empty(RoomId),
    Active(MessageStore),
}

impl Conversation {
    pub fn room_id(&self) -> &RoomId {
        match self {
            Conversation::Empty(id) => id,
            Conversation::Active(store) => store.room_id(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        match self {
            Conversation::Empty(_) => &[],
            Conversation::Active(store) => store.messages(),
        }
    }

    /// Insert a message, promoting an empty conversation to active on the
    /// first accepted one.
    pub fn insert(&mut self, msg: ChatMessage) -> bool {
        match self {
            Conversation::Active(store) => store.insert(msg),
            Conversation::Empty(id) => {
                let mut store = MessageStore::new(id.clone());
                if store.insert(msg) {
                    *self = Conversation::Active(store);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Load a fetched history (ascending by `created_at`).
    pub fn hydrate(&mut self, history: Vec<ChatMessage>) {
        for msg in history {
            self.insert(msg);
        }
    }
}
