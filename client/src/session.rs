//! Session lifecycle for the chat subsystem.
//!
//! A [`ChatSession`] is an explicit object created at login and torn down
//! at logout; it owns the socket handle, room registry, unread tracker,
//! notifier, and the currently open conversation. Hosts drive it by
//! feeding [`SocketEvent`]s from the receiver returned at login into
//! [`ChatSession::handle_event`].

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::notify::{NotificationSink, Notifier};
use crate::rooms::RoomRegistry;
use crate::socket::{SocketEvent, SocketHandle};
use crate::storage::{Storage, StoredSession};
use crate::store::Conversation;
use crate::unread::UnreadTracker;
use crate::upload;
use healthlink_protocol::events::{ClientEvent, OutgoingMessage, ServerEvent};
use healthlink_protocol::{ChatMessage, Role, RoomId, RoomSummary, UserId, UserProfile};
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

pub struct ChatSession {
    me: UserProfile,
    api: ApiClient,
    socket: SocketHandle,
    storage: Storage,
    registry: RoomRegistry,
    unread: UnreadTracker,
    notifier: Notifier,
    open: Option<Conversation>,
    /// In-flight history fetch for the room being opened; aborted when a
    /// newer open supersedes it.
    history_fetch: Option<AbortHandle>,
}

impl ChatSession {
    /// Authenticate and bring up the realtime subsystem: opens the socket,
    /// restores read markers, and discovers this user's rooms. The
    /// returned receiver carries socket events for the session lifetime.
    pub async fn login(
        config: &ClientConfig,
        email: &str,
        password: &str,
        sink: Box<dyn NotificationSink>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SocketEvent>)> {
        let storage = Storage::open(config.data_dir.clone())?;
        let mut api = ApiClient::new(config);
        let (token, user) = api.login(email, password).await?;

        if let Err(e) = storage.save_session(&StoredSession {
            token,
            user: user.clone(),
        }) {
            tracing::warn!("could not persist session: {e}");
        }

        let (socket, events) = SocketHandle::connect(config.socket_url());
        let mut session = Self::assemble(user, api, socket, storage, sink);
        session.discover_rooms().await;
        Ok((session, events))
    }

    /// Resume from a persisted session token without re-entering
    /// credentials. Fails with [`ClientError::Unauthorized`] downstream if
    /// the token has expired.
    pub async fn resume(
        config: &ClientConfig,
        sink: Box<dyn NotificationSink>,
    ) -> Result<Option<(Self, mpsc::UnboundedReceiver<SocketEvent>)>> {
        let storage = Storage::open(config.data_dir.clone())?;
        let Some(stored) = storage.load_session()? else {
            return Ok(None);
        };
        let mut api = ApiClient::new(config);
        api.set_token(stored.token);

        let (socket, events) = SocketHandle::connect(config.socket_url());
        let mut session = Self::assemble(stored.user, api, socket, storage, sink);
        session.discover_rooms().await;
        Ok(Some((session, events)))
    }

    fn assemble(
        me: UserProfile,
        api: ApiClient,
        socket: SocketHandle,
        storage: Storage,
        sink: Box<dyn NotificationSink>,
    ) -> Self {
        let markers = match storage.load_markers(&me.id) {
            Ok(markers) => markers,
            Err(e) => {
                tracing::warn!("could not load read markers: {e}");
                Default::default()
            }
        };
        Self {
            registry: RoomRegistry::new(me.id.clone()),
            unread: UnreadTracker::with_markers(me.id.clone(), markers),
            notifier: Notifier::new(sink),
            me,
            api,
            socket,
            storage,
            open: None,
            history_fetch: None,
        }
    }

    /// Fetch "rooms for this user" and join each. Room discovery is
    /// best-effort (the patient-side listing in particular may not exist
    /// on the backend): failures degrade to an empty list, never a crash.
    pub async fn discover_rooms(&mut self) {
        let listing = match self.me.role {
            Role::Doctor => self.api.rooms_for_doctor(&self.me.id).await,
            Role::Patient => self.api.rooms_for_patient(&self.me.id).await,
            // Admins are not chat participants; nothing to discover.
            Role::Admin => return,
        };
        match listing {
            Ok(rooms) => {
                for room in rooms {
                    let _ = self.socket.join_room(room.room_id.clone());
                    self.registry.insert(room);
                }
                tracing::info!(rooms = self.registry.len(), "room discovery complete");
            }
            Err(e) => tracing::warn!("room discovery failed: {e}"),
        }
    }

    /// Register a conversation partner before any message exists and join
    /// the derived room. Used when a patient opens a chat from the doctor
    /// finder (or vice versa).
    pub fn register_pair(
        &mut self,
        doctor: (&UserId, &str),
        patient: (&UserId, &str),
    ) -> Result<RoomId> {
        let room_id = self.registry.register_pair(doctor, patient);
        self.socket.join_room(room_id.clone())?;
        Ok(room_id)
    }

    /// Open a conversation: join the room, fetch its history, mark it
    /// read. An in-flight history fetch from a previously opened room is
    /// aborted here. Hydration only happens inside the future doing the
    /// open, so once a host drops a superseded `open_room` its history can
    /// never land in the newer room's view.
    pub async fn open_room(&mut self, room_id: RoomId) -> Result<()> {
        if let Some(fetch) = self.history_fetch.take() {
            fetch.abort();
        }
        self.open = Some(Conversation::Empty(room_id.clone()));
        self.socket.join_room(room_id.clone())?;

        let api = self.api.clone();
        let room = room_id.clone();
        let fetch = tokio::spawn(async move { api.history(&room).await });
        self.history_fetch = Some(fetch.abort_handle());

        let history = match fetch.await {
            Ok(result) => result?,
            Err(e) if e.is_cancelled() => return Ok(()),
            Err(e) => return Err(ClientError::Task(e.to_string())),
        };
        self.history_fetch = None;

        if let Some(conv) = self.open.as_mut() {
            conv.hydrate(history);
        }
        self.unread.mark_read(&room_id);
        self.persist_markers();
        Ok(())
    }

    /// Close the open conversation without tearing the session down.
    pub fn close_room(&mut self) {
        if let Some(fetch) = self.history_fetch.take() {
            fetch.abort();
        }
        self.open = None;
    }

    /// Route one socket event through the stores and the notification
    /// surface.
    pub fn handle_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Connected => tracing::info!("socket connected"),
            SocketEvent::Disconnected => tracing::warn!("socket disconnected"),
            SocketEvent::Error(e) => tracing::warn!("socket: {e}"),
            SocketEvent::Server(ServerEvent::ReceiveMessage(msg)) => self.apply_incoming(msg),
        }
    }

    fn apply_incoming(&mut self, msg: ChatMessage) {
        let open_room = self.open.as_ref().map(|c| c.room_id().clone());

        if open_room.as_ref() == Some(&msg.room_id) {
            if let Some(conv) = self.open.as_mut() {
                conv.insert(msg.clone());
            }
        }

        self.unread.record_live(&msg, open_room.as_ref());

        let sender_name = self.registry.display_name(&msg.sender_id);
        self.notifier
            .notify(&msg, &self.me.id, open_room.as_ref(), &sender_name);
    }

    /// Send a text message to the open conversation. Empty input and a
    /// missing peer are rejected visibly, before anything goes out.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        let body = text.trim();
        if body.is_empty() {
            return Err(ClientError::Validation("message is empty".into()));
        }
        let (room_id, receiver) = self.open_target()?;
        self.socket.emit(ClientEvent::SendMessage(OutgoingMessage {
            room_id,
            sender_id: self.me.id.clone(),
            receiver_id: receiver,
            message: body.to_owned(),
            file_url: String::new(),
        }))
    }

    /// Upload a file and send a message referencing it. Atomic from the
    /// user's point of view: validation failures reject before any network
    /// call, and a failed upload emits nothing.
    pub async fn send_attachment(&mut self, path: &Path, caption: &str) -> Result<()> {
        let prepared = upload::prepare_attachment(path)?;
        let (room_id, receiver) = self.open_target()?;

        let file_url = self.api.upload(&prepared.file_name, prepared.bytes).await?;
        self.socket.emit(ClientEvent::SendMessage(OutgoingMessage {
            room_id,
            sender_id: self.me.id.clone(),
            receiver_id: receiver,
            message: caption.trim().to_owned(),
            file_url,
        }))
    }

    fn open_target(&self) -> Result<(RoomId, UserId)> {
        let room_id = self
            .open
            .as_ref()
            .map(|c| c.room_id().clone())
            .ok_or_else(|| ClientError::Validation("no open conversation".into()))?;
        let receiver = self
            .registry
            .peer_of(&room_id)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| {
                ClientError::Validation(format!("unknown conversation partner for {room_id}"))
            })?;
        Ok((room_id, receiver))
    }

    /// Recompute unread badges for every discovered room from history.
    /// Optional: live traffic keeps badges current; this backfills them
    /// after login.
    pub async fn seed_unread_badges(&mut self) {
        let rooms: Vec<RoomId> = self.registry.room_ids().cloned().collect();
        for room in rooms {
            match self.api.history(&room).await {
                Ok(history) => self.unread.seed(&room, &history),
                Err(e) => tracing::warn!(%room, "badge seed failed: {e}"),
            }
        }
    }

    /// Tear down the realtime subsystem and persist client-side state.
    pub fn logout(mut self) {
        if let Some(fetch) = self.history_fetch.take() {
            fetch.abort();
        }
        self.socket.close();
        self.persist_markers();
        if let Err(e) = self.storage.clear_session() {
            tracing::warn!("could not clear stored session: {e}");
        }
    }

    fn persist_markers(&self) {
        if let Err(e) = self.storage.save_markers(&self.me.id, self.unread.markers()) {
            tracing::warn!("could not persist read markers: {e}");
        }
    }

    pub fn profile(&self) -> &UserProfile {
        &self.me
    }

    pub fn open_room_id(&self) -> Option<&RoomId> {
        self.open.as_ref().map(|c| c.room_id())
    }

    /// Messages of the open conversation, in render order.
    pub fn open_messages(&self) -> &[ChatMessage] {
        self.open.as_ref().map(|c| c.messages()).unwrap_or(&[])
    }

    pub fn unread_count(&self, room: &RoomId) -> usize {
        self.unread.unread_count(room)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &RoomSummary> {
        self.registry.rooms()
    }

    pub fn display_name(&self, user: &UserId) -> String {
        self.registry.display_name(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::test_sink::RecordingSink;
    use chrono::{TimeZone, Utc};
    use healthlink_protocol::events::ServerEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn profile(id: &str, role: Role) -> UserProfile {
        UserProfile {
            id: UserId::from(id),
            name: format!("User {id}"),
            role,
        }
    }

    fn message(id: &str, room: &RoomId, from: &str, to: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            room_id: room.clone(),
            sender_id: UserId::from(from),
            receiver_id: UserId::from(to),
            text: text.into(),
            attachment_url: String::new(),
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap(),
        }
    }

    /// Session whose REST client targets `server_url`, with a temp data
    /// dir. The socket always points at a dead endpoint so no websocket
    /// traffic reaches a test server.
    fn session_against(
        server_url: &str,
        me: UserProfile,
        sink: RecordingSink,
    ) -> (ChatSession, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            server_url: server_url.into(),
            data_dir: Some(dir.path().to_path_buf()),
        };
        let storage = Storage::open(config.data_dir.clone()).unwrap();
        let api = ApiClient::new(&config);
        let (socket, _events) = SocketHandle::connect("ws://127.0.0.1:9/ws".into());
        let session = ChatSession::assemble(me, api, socket, storage, Box::new(sink));
        (session, dir)
    }

    /// Session with no reachable backend at all.
    fn offline_session(me: UserProfile, sink: RecordingSink) -> (ChatSession, tempfile::TempDir) {
        session_against("http://127.0.0.1:9", me, sink)
    }

    fn history_json(id: &str, room: &str, sender: &str, text: &str) -> String {
        format!(
            r#"{{"success":true,"messages":[{{"_id":"{id}","roomId":"{room}","senderId":"{sender}","receiverId":"d1","message":"{text}","fileUrl":"","createdAt":"2026-08-01T10:00:00Z"}}]}}"#
        )
    }

    /// Minimal HTTP server with canned chat histories. Requests for room
    /// `d1_p1` are answered after a delay to stand in for a slow backend;
    /// everything else gets room `d1_p2`'s history immediately. Every
    /// accepted connection bumps `hits`.
    async fn spawn_history_server(hits: Arc<AtomicUsize>) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                hits.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    use tokio::io::{AsyncReadExt, AsyncWriteExt};
                    let mut buf = [0u8; 1024];
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).into_owned();
                    let body = if request.contains("/api/chat/d1_p1 ") {
                        tokio::time::sleep(Duration::from_millis(400)).await;
                        history_json("a1", "d1_p1", "p1", "old complaint")
                    } else {
                        history_json("b1", "d1_p2", "p2", "new complaint")
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn doctor_scenario_unread_and_toast() {
        // Doctor D has rooms with patients P1 and P2 and is viewing P2.
        let sink = RecordingSink::default();
        let (mut session, _dir) = offline_session(profile("d1", Role::Doctor), sink.clone());

        let d = UserId::from("d1");
        let p1 = UserId::from("p1");
        let p2 = UserId::from("p2");
        let room1 = session.registry.register_pair((&d, "Dr. D"), (&p1, "P1"));
        let room2 = session.registry.register_pair((&d, "Dr. D"), (&p2, "P2"));
        session.open = Some(Conversation::Empty(room2.clone()));
        session.unread.mark_read(&room2);

        // P1 says hello while D views P2's room.
        session.handle_event(SocketEvent::Server(ServerEvent::ReceiveMessage(message(
            "m1", &room1, "p1", "d1", "hello",
        ))));

        assert_eq!(session.unread_count(&room1), 1);
        assert_eq!(session.unread_count(&room2), 0);
        let toasts = sink.toasts.lock().unwrap();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].sender_name, "P1");
        assert_eq!(toasts[0].preview, "hello");
    }

    #[tokio::test]
    async fn open_room_messages_render_without_notifying() {
        let sink = RecordingSink::default();
        let (mut session, _dir) = offline_session(profile("d1", Role::Doctor), sink.clone());

        let d = UserId::from("d1");
        let p1 = UserId::from("p1");
        let room = session.registry.register_pair((&d, "Dr. D"), (&p1, "P1"));
        session.open = Some(Conversation::Empty(room.clone()));
        session.unread.mark_read(&room);

        session.handle_event(SocketEvent::Server(ServerEvent::ReceiveMessage(message(
            "m1", &room, "p1", "d1", "hi doc",
        ))));

        assert_eq!(session.open_messages().len(), 1);
        assert_eq!(session.unread_count(&room), 0);
        assert!(sink.toasts.lock().unwrap().is_empty());
        assert_eq!(*sink.cues.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn own_echoed_message_never_notifies() {
        let sink = RecordingSink::default();
        let (mut session, _dir) = offline_session(profile("d1", Role::Doctor), sink.clone());

        let d = UserId::from("d1");
        let p1 = UserId::from("p1");
        let room = session.registry.register_pair((&d, "Dr. D"), (&p1, "P1"));

        // Server echoes the doctor's own message into an unopened room.
        session.handle_event(SocketEvent::Server(ServerEvent::ReceiveMessage(message(
            "m1", &room, "d1", "p1", "take rest",
        ))));

        assert_eq!(session.unread_count(&room), 0);
        assert!(sink.toasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_delivery_renders_once() {
        let sink = RecordingSink::default();
        let (mut session, _dir) = offline_session(profile("d1", Role::Doctor), sink.clone());

        let d = UserId::from("d1");
        let p1 = UserId::from("p1");
        let room = session.registry.register_pair((&d, "Dr. D"), (&p1, "P1"));
        session.open = Some(Conversation::Empty(room.clone()));

        let msg = message("m1", &room, "p1", "d1", "hello");
        session.handle_event(SocketEvent::Server(ServerEvent::ReceiveMessage(msg.clone())));
        session.handle_event(SocketEvent::Server(ServerEvent::ReceiveMessage(msg)));

        assert_eq!(session.open_messages().len(), 1);
    }

    #[tokio::test]
    async fn open_room_surfaces_history_fetch_failure() {
        let sink = RecordingSink::default();
        let (mut session, _dir) = offline_session(profile("d1", Role::Doctor), sink);

        let d = UserId::from("d1");
        let p1 = UserId::from("p1");
        let room = session.registry.register_pair((&d, "Dr. D"), (&p1, "P1"));

        // Backend unreachable: the fetch fails loudly, but the
        // conversation stays open and empty so live traffic still renders.
        let err = session.open_room(room.clone()).await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)));
        assert_eq!(session.open_room_id(), Some(&room));
        assert!(session.open_messages().is_empty());
    }

    #[tokio::test]
    async fn room_switch_discards_superseded_history_fetch() {
        let sink = RecordingSink::default();
        let addr = spawn_history_server(Arc::new(AtomicUsize::new(0))).await;
        let (mut session, _dir) =
            session_against(&format!("http://{addr}"), profile("d1", Role::Doctor), sink);

        let d = UserId::from("d1");
        let p1 = UserId::from("p1");
        let p2 = UserId::from("p2");
        let room_a = session.registry.register_pair((&d, "Dr. D"), (&p1, "P1"));
        let room_b = session.registry.register_pair((&d, "Dr. D"), (&p2, "P2"));

        // Switch rooms while A's slow history fetch is still in flight,
        // the way a host cancels a stale open when the user clicks away.
        let opened_a =
            tokio::time::timeout(Duration::from_millis(50), session.open_room(room_a.clone()))
                .await;
        assert!(opened_a.is_err());
        session.open_room(room_b.clone()).await.unwrap();

        // Wait out A's delayed response; it must never reach the view.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(session.open_room_id(), Some(&room_b));
        let ids: Vec<_> = session
            .open_messages()
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, ["b1"]);
    }

    #[tokio::test]
    async fn admin_sessions_skip_room_discovery() {
        let sink = RecordingSink::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_history_server(hits.clone()).await;
        let (mut session, _dir) =
            session_against(&format!("http://{addr}"), profile("a1", Role::Admin), sink);

        session.discover_rooms().await;

        assert_eq!(session.rooms().count(), 0);
        // No listing request went out at all.
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn send_text_requires_an_open_conversation() {
        let sink = RecordingSink::default();
        let (mut session, _dir) = offline_session(profile("p1", Role::Patient), sink);

        assert!(matches!(
            session.send_text("hello"),
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            session.send_text("   "),
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn send_text_goes_to_the_open_peer() {
        let sink = RecordingSink::default();
        let (mut session, _dir) = offline_session(profile("p1", Role::Patient), sink);

        let d = UserId::from("d1");
        let p1 = UserId::from("p1");
        let room = session.registry.register_pair((&d, "Dr. D"), (&p1, "P1"));
        session.open = Some(Conversation::Empty(room));

        // Socket is still connecting; the send is buffered, not an error.
        session.send_text("hello doctor").unwrap();
    }

    #[tokio::test]
    async fn oversize_attachment_is_rejected_before_any_network_call() {
        let sink = RecordingSink::default();
        let (mut session, dir) = offline_session(profile("p1", Role::Patient), sink);

        let d = UserId::from("d1");
        let p1 = UserId::from("p1");
        let room = session.registry.register_pair((&d, "Dr. D"), (&p1, "P1"));
        session.open = Some(Conversation::Empty(room));

        let path = dir.path().join("big.pdf");
        std::fs::write(&path, vec![0u8; 10 * 1024 * 1024]).unwrap();

        // The API endpoint is unreachable; a network attempt would surface
        // as ClientError::Http, so Validation proves we failed first.
        let err = session.send_attachment(&path, "").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }
}
