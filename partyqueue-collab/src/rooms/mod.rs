mod room;
mod watcher;

use std::sync::Arc;

use log::info;
use partyqueue_core::{ClockError, QueueError, RequestQueue, RoomId, TimeSource};
use thiserror::Error;

use crate::{
    util::{random_slug, random_string},
    CollabContext, CollabEvent, Database, DatabaseError, NewRoom, RequestPartition,
};

pub use room::*;
pub use watcher::*;

pub struct RoomManager<Db> {
    context: CollabContext<Db>,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("The {resource} {identifier} was not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error("Room {0} already exists")]
    AlreadyExists(RoomId),
    /// The change could not be stored, so it was not applied
    #[error("Change could not be stored: {0}")]
    PersistenceFailure(DatabaseError),
}

impl From<ClockError> for RoomError {
    fn from(error: ClockError) -> Self {
        match error {
            ClockError::InvalidTransition { action, state } => {
                RoomError::InvalidTransition { action, state }
            }
        }
    }
}

impl From<QueueError> for RoomError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::NotFound(song_id) => RoomError::NotFound {
                resource: "song",
                identifier: song_id.to_string(),
            },
            QueueError::NotWaiting(_) | QueueError::AlreadyPlaying { .. } => {
                RoomError::InvalidTransition {
                    action: "promote",
                    state: "playing",
                }
            }
            e @ QueueError::MultiplePlaying { .. } => {
                RoomError::PersistenceFailure(DatabaseError::Malformed {
                    resource: "requests",
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl<Db> RoomManager<Db>
where
    Db: Database,
{
    pub fn new(context: &CollabContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Restores the rooms and their queues from the database on init
    pub async fn restore(&self) -> Result<(), DatabaseError> {
        let database = &self.context.database;

        for data in database.list_rooms().await? {
            let requests = database
                .requests_by_room(&data.id, RequestPartition::All)
                .await?;

            let queue =
                RequestQueue::restore(data.id.clone(), self.context.policy.clone(), requests)
                    .map_err(|e| DatabaseError::Malformed {
                        resource: "requests",
                        reason: e.to_string(),
                    })?;

            let room = Room::new(&self.context, data, queue);
            self.context.rooms.insert(room.id(), room.into());
        }

        info!("Restored {} rooms", self.context.rooms.len());
        Ok(())
    }

    /// Creates a new room, with a generated id unless one is requested
    pub async fn create_room(&self, requested_id: Option<RoomId>) -> Result<Arc<Room<Db>>, RoomError> {
        let config = &self.context.config;

        let id = requested_id.unwrap_or_else(|| RoomId::new(random_slug(config.room_id_length)));
        let created_at = self.context.time.now();

        let new_room = NewRoom {
            id: id.clone(),
            host_token: random_string(config.host_token_length),
            created_at,
        };

        let data = self
            .context
            .database
            .create_room(new_room)
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict { .. } => RoomError::AlreadyExists(id.clone()),
                e => RoomError::PersistenceFailure(e),
            })?;

        let queue = RequestQueue::with_policy(id.clone(), self.context.policy.clone());
        let room = Arc::new(Room::new(&self.context, data, queue));

        self.context.rooms.insert(room.id(), room.clone());
        self.context.emit(CollabEvent::RoomCreated { room_id: id.clone() });

        info!("Created room {}", id);
        Ok(room)
    }

    pub fn room_by_id(&self, room_id: &RoomId) -> Result<Arc<Room<Db>>, RoomError> {
        self.context
            .rooms
            .get(room_id)
            .map(|r| r.clone())
            .ok_or_else(|| RoomError::NotFound {
                resource: "room",
                identifier: room_id.to_string(),
            })
    }

    /// Get all rooms in memory
    pub fn list_all(&self) -> Vec<Arc<Room<Db>>> {
        let mut rooms: Vec<_> = self.context.rooms.iter().map(|r| r.clone()).collect();
        rooms.sort_by_key(|r| r.data().created_at);
        rooms
    }
}
