use crate::{RoomId, SongId, Timestamp};

/// A song requested in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub room_id: RoomId,
    pub song_id: SongId,
    /// The length of the song in milliseconds
    pub duration: u64,
    /// How many times the song has been requested while live in the room
    pub votes: u32,
    pub state: RequestState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Queued, ordered by priority and then time
    Waiting {
        priority: i32,
        /// Insertion or last boost time
        time: Timestamp,
    },
    /// The room's now playing request
    Playing { started_at: Timestamp },
}

impl Request {
    pub fn is_playing(&self) -> bool {
        matches!(self.state, RequestState::Playing { .. })
    }

    /// Returns the priority of a waiting request.
    pub fn priority(&self) -> Option<i32> {
        match self.state {
            RequestState::Waiting { priority, .. } => Some(priority),
            RequestState::Playing { .. } => None,
        }
    }

    /// Returns the insertion or boost time, or the start time if playing.
    pub fn time(&self) -> Timestamp {
        match self.state {
            RequestState::Waiting { time, .. } => time,
            RequestState::Playing { started_at } => started_at,
        }
    }
}
