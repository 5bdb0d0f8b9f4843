use axum::{
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use crossbeam::atomic::AtomicCell;
use futures_util::Stream;
use log::{error, info};
use parking_lot::Mutex;
use partyqueue_collab::{CollabEvent, EventReceiver};
use serde::Serialize;
use std::{
    collections::VecDeque,
    convert::Infallible,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
    thread,
};
use utoipa::ToSchema;

use crate::{
    context::ServerContext,
    serialized::{PlaybackStatus, ToSerialized},
    Router,
};

static NEXT_CONNECTION: AtomicCell<u64> = AtomicCell::new(1);

/// Identifies one open event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// A room was created
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_id: String },
    /// A room started playing, paused, resumed, or went idle.
    #[serde(rename_all = "camelCase")]
    RoomStatusUpdate {
        room_id: String,
        new_status: PlaybackStatus,
        /// Milliseconds left of the now playing song when the status changed
        remaining_ms: u64,
    },
    /// The now playing song of a room changed
    #[serde(rename_all = "camelCase")]
    NowPlayingUpdate {
        room_id: String,
        song_id: Option<String>,
    },
    /// The waiting list of a room changed, clients should fetch it again
    #[serde(rename_all = "camelCase")]
    QueueUpdate { room_id: String },
}

impl From<CollabEvent> for ServerEvent {
    fn from(value: CollabEvent) -> Self {
        match value {
            CollabEvent::RoomCreated { room_id } => Self::RoomCreated {
                room_id: room_id.to_string(),
            },
            CollabEvent::RoomStatusUpdate {
                room_id,
                new_status,
                remaining,
            } => Self::RoomStatusUpdate {
                room_id: room_id.to_string(),
                new_status: new_status.to_serialized(),
                remaining_ms: remaining,
            },
            CollabEvent::NowPlayingUpdate { room_id, song_id } => Self::NowPlayingUpdate {
                room_id: room_id.to_string(),
                song_id: song_id.map(|s| s.to_string()),
            },
            CollabEvent::QueueUpdate { room_id } => Self::QueueUpdate {
                room_id: room_id.to_string(),
            },
        }
    }
}

/// Manages server sent event connections
pub struct ServerSentEvents {
    me: Weak<Self>,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    pub fn broadcast(&self, event: ServerEvent) {
        let connections = self.connections.lock();

        for connection in connections.iter() {
            connection.send(event.clone())
        }
    }

    /// Forwards every collab event to the connected clients, on its own thread.
    pub fn forward(self: &Arc<Self>, receiver: EventReceiver) {
        let me = Arc::downgrade(self);

        let spawned = thread::Builder::new()
            .name("sse-forwarder".to_string())
            .spawn(move || {
                while let Ok(event) = receiver.recv() {
                    let Some(sse) = me.upgrade() else {
                        break;
                    };

                    sse.broadcast(event.into());
                }

                info!("Stopped forwarding events");
            });

        if let Err(e) = spawned {
            error!("Could not start forwarding events: {}", e);
        }
    }

    pub fn connect(&self) -> ConnectionHandle {
        let connection = Connection::new();
        let handle = connection.handle(self.me.clone());

        self.connections.lock().push(connection);
        handle
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }
}

impl Connection {
    fn new() -> Self {
        Self {
            id: ConnectionId::next(),
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push_back(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Store the waker before looking, so a message sent in between still wakes us
        *self.waker.lock() = Some(cx.waker().clone());

        let next_event = self.pending_messages.lock().pop_front();

        match next_event {
            Some(message) => {
                let event = Event::default()
                    .json_data(&message)
                    .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));

                Poll::Ready(Some(Ok(event)))
            }
            None => Poll::Pending,
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events from partyqueue",
            body = ServerEvent
        )
    )
)]
pub async fn event_stream(context: ServerContext) -> Sse<ConnectionHandle> {
    Sse::new(context.sse.connect()).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new().route("/", get(event_stream))
}
