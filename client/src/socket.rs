//! Socket connection manager.
//!
//! One realtime connection per authenticated session, owned by a spawned
//! task. Commands flow in over an mpsc channel; decoded server events flow
//! out over an unbounded channel. Sends attempted before the connection is
//! up are buffered and flushed on connect, never silently dropped. A
//! dropped connection reconnects with exponential backoff, re-joining
//! every previously joined room before flushing the backlog. Delivery is
//! at-most-once from the client's perspective; there are no message-level
//! acks.

use crate::error::{ClientError, Result};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use healthlink_protocol::events::{ClientEvent, ServerEvent};
use healthlink_protocol::RoomId;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Events surfaced to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Connected,
    Disconnected,
    Server(ServerEvent),
    /// Transport or decode failure. Informational; the manager keeps going.
    Error(String),
}

#[derive(Debug)]
enum Command {
    Emit(ClientEvent),
    Close,
}

/// Handle to the connection manager task. Cloneable; closing any clone
/// tears the connection down.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl SocketHandle {
    /// Spawn the connection manager. Events arrive on the returned
    /// receiver until [`SocketHandle::close`] is called or every handle is
    /// dropped.
    pub fn connect(url: String) -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(url, cmd_rx, event_tx));
        (Self { cmd_tx }, event_rx)
    }

    /// Queue an event for delivery (buffered while disconnected). Fails
    /// only once the manager has shut down.
    pub fn emit(&self, event: ClientEvent) -> Result<()> {
        self.cmd_tx
            .send(Command::Emit(event))
            .map_err(|_| ClientError::Socket("connection manager is closed".into()))
    }

    pub fn join_room(&self, room: RoomId) -> Result<()> {
        self.emit(ClientEvent::JoinRoom(room))
    }

    pub fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close);
    }
}

/// Send-side bookkeeping, separate from the socket task for testability:
/// the backlog of events that could not go out yet, and the set of joined
/// rooms to replay after a reconnect.
#[derive(Debug, Default)]
struct Outbox {
    pending: VecDeque<ClientEvent>,
    joined: Vec<RoomId>,
}

impl Outbox {
    /// Remember joined rooms so they can be replayed after a reconnect.
    fn note_join(&mut self, event: &ClientEvent) {
        if let ClientEvent::JoinRoom(room) = event {
            if !self.joined.contains(room) {
                self.joined.push(room.clone());
            }
        }
    }

    /// Buffer an event that could not be sent yet.
    fn buffer(&mut self, event: ClientEvent) {
        self.note_join(&event);
        self.pending.push_back(event);
    }

    /// Everything to send on (re)connect: room re-joins first, then the
    /// buffered backlog in order. Joins in the backlog are already covered
    /// by the replay and are dropped from it.
    fn flush_plan(&mut self) -> Vec<ClientEvent> {
        let mut plan: Vec<ClientEvent> = self
            .joined
            .iter()
            .cloned()
            .map(ClientEvent::JoinRoom)
            .collect();
        plan.extend(
            self.pending
                .drain(..)
                .filter(|ev| !matches!(ev, ClientEvent::JoinRoom(_))),
        );
        plan
    }
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

async fn run(
    url: String,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<SocketEvent>,
) {
    let mut outbox = Outbox::default();
    let mut backoff = BACKOFF_BASE;

    loop {
        let stream = match connect_async(url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                let _ = event_tx.send(SocketEvent::Error(format!("connect {url}: {e}")));
                if absorb_commands_for(&mut cmd_rx, &mut outbox, backoff).await {
                    return;
                }
                backoff = (backoff * 2).min(BACKOFF_CAP);
                continue;
            }
        };

        backoff = BACKOFF_BASE;
        tracing::debug!(%url, "socket connected");
        let _ = event_tx.send(SocketEvent::Connected);
        let (mut sink, mut source) = stream.split();

        // Replay joins and flush the backlog before serving new traffic.
        let mut healthy = true;
        let mut plan = outbox.flush_plan().into_iter();
        while let Some(event) = plan.next() {
            if !send_event(&mut sink, &event, &event_tx).await {
                outbox.buffer(event);
                for rest in plan.by_ref() {
                    outbox.buffer(rest);
                }
                healthy = false;
                break;
            }
        }

        while healthy {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    None | Some(Command::Close) => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        let _ = event_tx.send(SocketEvent::Disconnected);
                        return;
                    }
                    Some(Command::Emit(event)) => {
                        outbox.note_join(&event);
                        if !send_event(&mut sink, &event, &event_tx).await {
                            outbox.buffer(event);
                            healthy = false;
                        }
                    }
                },
                frame = source.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => match ServerEvent::from_frame(text.as_str()) {
                        Ok(event) => {
                            let _ = event_tx.send(SocketEvent::Server(event));
                        }
                        Err(e) => {
                            let _ = event_tx.send(SocketEvent::Error(format!("bad frame: {e}")));
                        }
                    },
                    Some(Ok(WsMessage::Close(_))) | None => healthy = false,
                    Some(Err(e)) => {
                        let _ = event_tx.send(SocketEvent::Error(format!("socket read: {e}")));
                        healthy = false;
                    }
                    // Pings are answered by the transport; binary frames
                    // are not part of the contract.
                    Some(Ok(_)) => {}
                },
            }
        }

        tracing::debug!("socket dropped, reconnecting");
        let _ = event_tx.send(SocketEvent::Disconnected);
    }
}

/// Returns true on success. On failure the connection is considered dead
/// and the caller re-buffers the event.
async fn send_event(
    sink: &mut WsSink,
    event: &ClientEvent,
    event_tx: &mpsc::UnboundedSender<SocketEvent>,
) -> bool {
    let frame = match event.to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            // Encoding never depends on the connection; report and drop.
            let _ = event_tx.send(SocketEvent::Error(format!("encode: {e}")));
            return true;
        }
    };
    match sink.send(WsMessage::text(frame)).await {
        Ok(()) => true,
        Err(e) => {
            let _ = event_tx.send(SocketEvent::Error(format!("socket send: {e}")));
            false
        }
    }
}

/// Wait out the reconnect backoff while still absorbing commands, so
/// buffered sends survive and `Close` stays responsive. Returns true when
/// the manager should shut down.
async fn absorb_commands_for(
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    outbox: &mut Outbox,
    delay: Duration,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return false,
            cmd = cmd_rx.recv() => match cmd {
                None | Some(Command::Close) => return true,
                Some(Command::Emit(event)) => outbox.buffer(event),
            },
        }
    }
}
