use crossbeam::channel::{Receiver, Sender};
use partyqueue_core::{RoomId, SongId};

use crate::RoomStatus;

pub type EventSender = Sender<CollabEvent>;
pub type EventReceiver = Receiver<CollabEvent>;

/// Events emitted whenever a room transition commits.
///
/// How, or if, clients are told about these is up to the consumer of the receiver.
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// A room was created
    RoomCreated { room_id: RoomId },
    /// A room moved between idle, playing, and paused
    RoomStatusUpdate {
        room_id: RoomId,
        new_status: RoomStatus,
        /// Milliseconds left of the now playing song at the time of the change
        remaining: u64,
    },
    /// The now playing request of a room changed
    NowPlayingUpdate {
        room_id: RoomId,
        song_id: Option<SongId>,
    },
    /// Songs were added to, boosted in, or removed from the waiting list
    QueueUpdate { room_id: RoomId },
}
