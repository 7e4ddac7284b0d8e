//! Notification surface for messages arriving outside the open room.
//!
//! The decision logic lives here; how a toast or cue is actually rendered
//! is the host's business, injected as a [`NotificationSink`]. The default
//! sink logs through `tracing`.

use healthlink_protocol::{ChatMessage, RoomId, UserId};

/// Toast previews are capped at this many characters.
const PREVIEW_MAX_CHARS: usize = 80;

/// A transient toast describing an incoming message.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub preview: String,
}

/// Host-provided surface for toasts and the audible cue.
pub trait NotificationSink: Send {
    fn toast(&mut self, note: &Notification);
    fn play_cue(&mut self);
}

/// Default sink: structured log lines instead of OS toasts.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn toast(&mut self, note: &Notification) {
        tracing::info!(room = %note.room_id, "{}: {}", note.sender_name, note.preview);
    }

    fn play_cue(&mut self) {
        tracing::debug!("notification cue");
    }
}

pub struct Notifier {
    sink: Box<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Box<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Surface a live message if it warrants a notification. Silent for
    /// messages the user authored, for messages addressed to someone else,
    /// and for the open conversation. Returns true when surfaced.
    pub fn notify(
        &mut self,
        msg: &ChatMessage,
        me: &UserId,
        open_room: Option<&RoomId>,
        sender_name: &str,
    ) -> bool {
        if &msg.sender_id == me || &msg.receiver_id != me {
            return false;
        }
        if open_room == Some(&msg.room_id) {
            return false;
        }

        let note = Notification {
            room_id: msg.room_id.clone(),
            sender_id: msg.sender_id.clone(),
            sender_name: sender_name.to_owned(),
            preview: preview_of(msg),
        };
        self.sink.play_cue();
        self.sink.toast(&note);
        true
    }
}

/// Truncated message preview; attachment-only messages get a marker.
fn preview_of(msg: &ChatMessage) -> String {
    if msg.has_text() {
        truncate(msg.text.trim())
    } else if msg.has_attachment() {
        "[attachment]".to_owned()
    } else {
        String::new()
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= PREVIEW_MAX_CHARS {
        return text.to_owned();
    }
    let head: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
    format!("{head}…")
}

#[cfg(test)]
pub(crate) mod test_sink {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records toasts and cue counts for assertions.
    #[derive(Default, Clone)]
    pub struct RecordingSink {
        pub toasts: Arc<Mutex<Vec<Notification>>>,
        pub cues: Arc<Mutex<usize>>,
    }

    impl NotificationSink for RecordingSink {
        fn toast(&mut self, note: &Notification) {
            self.toasts.lock().unwrap().push(note.clone());
        }

        fn play_cue(&mut self) {
            *self.cues.lock().unwrap() += 1;
        }
    }
}
