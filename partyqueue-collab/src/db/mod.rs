use std::sync::Arc;

use async_trait::async_trait;
use partyqueue_core::{Request, RoomId, SongId, Timestamp};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    /// A stored row could not be turned back into its entity
    #[error("Stored {resource} is malformed: {reason}")]
    Malformed {
        resource: &'static str,
        reason: String,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    /// Turns a unique constraint violation into a conflict, anything else into [DatabaseError::Internal]
    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Which requests of a room to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPartition {
    All,
    Playing,
    Waiting,
}

/// Represents a type that can store partyqueue rooms, requests, and song metadata
#[async_trait]
pub trait Database
where
    Self: Send + Sync + 'static,
{
    async fn list_rooms(&self) -> Result<Vec<RoomData>>;
    async fn room_by_id(&self, room_id: &RoomId) -> Result<RoomData>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;

    /// Returns the requests of a room, playing one first, then waiting in play order.
    async fn requests_by_room(
        &self,
        room_id: &RoomId,
        partition: RequestPartition,
    ) -> Result<Vec<Request>>;

    /// Writes a room transition. Either every change is stored or none is.
    async fn commit_room(&self, changes: RoomChanges) -> Result<()>;

    /// Looks up metadata for many songs at once. Unknown songs are left out.
    async fn metadata_by_ids(&self, song_ids: &[SongId]) -> Result<Vec<Metadata>>;
    async fn upsert_metadata(&self, metadata: Metadata) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub id: RoomId,
    /// The credential handed to whoever created the room
    pub host_token: String,
    pub created_at: Timestamp,
}

/// Everything a single room transition writes.
#[derive(Debug, Clone)]
pub struct RoomChanges {
    pub room: RoomData,
    /// Requests that are new or changed
    pub upserted: Vec<Request>,
    /// Requests that left the room
    pub removed: Vec<SongId>,
}

/// Lets a shared or type-erased database stand in wherever one is expected
#[async_trait]
impl<D> Database for Arc<D>
where
    D: Database + ?Sized,
{
    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        (**self).list_rooms().await
    }

    async fn room_by_id(&self, room_id: &RoomId) -> Result<RoomData> {
        (**self).room_by_id(room_id).await
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        (**self).create_room(new_room).await
    }

    async fn requests_by_room(
        &self,
        room_id: &RoomId,
        partition: RequestPartition,
    ) -> Result<Vec<Request>> {
        (**self).requests_by_room(room_id, partition).await
    }

    async fn commit_room(&self, changes: RoomChanges) -> Result<()> {
        (**self).commit_room(changes).await
    }

    async fn metadata_by_ids(&self, song_ids: &[SongId]) -> Result<Vec<Metadata>> {
        (**self).metadata_by_ids(song_ids).await
    }

    async fn upsert_metadata(&self, metadata: Metadata) -> Result<()> {
        (**self).upsert_metadata(metadata).await
    }
}
