//! All schemas that are exposed from endpoints are defined here
//! along with their [ToSerialized] impls

use std::sync::Arc;

use partyqueue_collab::{Database, Joined, Metadata, Room as CollabRoom, RoomData, RoomStatus};
use partyqueue_core::{epoch_millis, Request, RequestState};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackStatus {
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    id: String,
    status: PlaybackStatus,
    /// Milliseconds left of the now playing song
    remaining_ms: u64,
    now_playing: Option<String>,
    waiting_count: usize,
    created_at: i64,
    last_used: i64,
}

/// Returned once, when a room is created
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoom {
    room: Room,
    host_token: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    song_id: String,
    duration_ms: u64,
    votes: u32,
    /// Lower plays sooner. Absent for the now playing song.
    priority: Option<i32>,
    /// When the song started playing or was last requested, in epoch milliseconds
    time: i64,
    playing: bool,
    metadata: Option<SongMetadata>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SongMetadata {
    title: String,
    artist: String,
    popularity: i32,
    last_requested: Option<i64>,
    image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    status: PlaybackStatus,
    remaining_ms: u64,
    item: Option<QueueItem>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<PlaybackStatus> for RoomStatus {
    fn to_serialized(&self) -> PlaybackStatus {
        match self {
            RoomStatus::Idle => PlaybackStatus::Idle,
            RoomStatus::Playing => PlaybackStatus::Playing,
            RoomStatus::Paused => PlaybackStatus::Paused,
        }
    }
}

impl<Db> ToSerialized<Room> for Arc<CollabRoom<Db>>
where
    Db: Database,
{
    fn to_serialized(&self) -> Room {
        let snapshot = self.snapshot();

        Room {
            id: snapshot.room.id.to_string(),
            status: snapshot.status.to_serialized(),
            remaining_ms: snapshot.remaining,
            now_playing: snapshot.now_playing.map(|r| r.song_id.to_string()),
            waiting_count: snapshot.waiting.len(),
            created_at: epoch_millis(snapshot.room.created_at),
            last_used: epoch_millis(snapshot.room.last_used),
        }
    }
}

impl<Db> ToSerialized<CreatedRoom> for Arc<CollabRoom<Db>>
where
    Db: Database,
{
    fn to_serialized(&self) -> CreatedRoom {
        let RoomData { host_token, .. } = self.data();

        CreatedRoom {
            room: self.to_serialized(),
            host_token,
        }
    }
}

impl ToSerialized<QueueItem> for Request {
    fn to_serialized(&self) -> QueueItem {
        QueueItem {
            song_id: self.song_id.to_string(),
            duration_ms: self.duration,
            votes: self.votes,
            priority: self.priority(),
            time: epoch_millis(self.time()),
            playing: matches!(self.state, RequestState::Playing { .. }),
            metadata: None,
        }
    }
}

impl ToSerialized<QueueItem> for Joined {
    fn to_serialized(&self) -> QueueItem {
        QueueItem {
            metadata: self.metadata.to_serialized(),
            ..self.request.to_serialized()
        }
    }
}

impl ToSerialized<SongMetadata> for Metadata {
    fn to_serialized(&self) -> SongMetadata {
        SongMetadata {
            title: self.title.clone(),
            artist: self.artist.clone(),
            popularity: self.popularity,
            last_requested: self.last_requested.map(epoch_millis),
            image: self.image.clone(),
        }
    }
}

impl NowPlaying {
    pub fn new(status: RoomStatus, remaining_ms: u64, item: Option<&Joined>) -> Self {
        Self {
            status: status.to_serialized(),
            remaining_ms,
            item: item.map(|j| j.to_serialized()),
        }
    }
}
