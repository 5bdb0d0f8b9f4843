use std::{
    collections::{btree_map::Entry, BTreeMap, HashMap},
    io,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use partyqueue_core::{Request, RoomId, SongId};

use crate::{
    Database, DatabaseError, Metadata, MetadataRow, NewRoom, RequestPartition,
    RequestRow, Result, RoomChanges, RoomData, RoomRow,
};

/// A database that lives in memory. Rows are stored in their persisted form,
/// so the same mapping as [PgDatabase](crate::PgDatabase) is exercised.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

#[derive(Default)]
struct Tables {
    rooms: BTreeMap<String, RoomRow>,
    requests: HashMap<(String, String), RequestRow>,
    songs: HashMap<String, MetadataRow>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable, every operation fails like a lost connection would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            let error = io::Error::new(io::ErrorKind::NotConnected, "database is unavailable");
            return Err(DatabaseError::Internal(Box::new(error)));
        }

        Ok(())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        self.ensure_available()?;

        let mut rooms: Vec<_> = self.tables.lock().rooms.values().cloned().collect();
        rooms.sort_by_key(|r| r.created_at);

        rooms.into_iter().map(RoomRow::into_data).collect()
    }

    async fn room_by_id(&self, room_id: &RoomId) -> Result<RoomData> {
        self.ensure_available()?;

        self.tables
            .lock()
            .rooms
            .get(room_id.as_str())
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            })?
            .into_data()
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        self.ensure_available()?;

        let row = RoomRow {
            id: new_room.id.to_string(),
            host_token: new_room.host_token,
            created_at: new_room.created_at,
            last_used: new_room.created_at,
            started_at: None,
            paused_at: None,
            current_duration: 0,
            target_duration: 0,
        };

        // Checked and inserted under one lock, so concurrent creates cannot both win
        match self.tables.lock().rooms.entry(row.id.clone()) {
            Entry::Occupied(_) => Err(DatabaseError::Conflict {
                resource: "room",
                field: "id",
                value: row.id,
            }),
            Entry::Vacant(entry) => entry.insert(row).clone().into_data(),
        }
    }

    async fn requests_by_room(
        &self,
        room_id: &RoomId,
        partition: RequestPartition,
    ) -> Result<Vec<Request>> {
        self.ensure_available()?;

        let mut rows: Vec<_> = self
            .tables
            .lock()
            .requests
            .values()
            .filter(|r| r.room_id == room_id.as_str())
            .filter(|r| match partition {
                RequestPartition::All => true,
                RequestPartition::Playing => r.priority < 0,
                RequestPartition::Waiting => r.priority >= 0,
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| (a.priority, a.time).cmp(&(b.priority, b.time)));

        rows.into_iter().map(RequestRow::into_request).collect()
    }

    async fn commit_room(&self, changes: RoomChanges) -> Result<()> {
        self.ensure_available()?;

        let room = RoomRow::from_data(&changes.room)?;
        let upserted = changes
            .upserted
            .iter()
            .map(RequestRow::from_request)
            .collect::<Result<Vec<_>>>()?;

        let mut tables = self.tables.lock();

        if !tables.rooms.contains_key(&room.id) {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        for song_id in &changes.removed {
            tables
                .requests
                .remove(&(room.id.clone(), song_id.to_string()));
        }

        for row in upserted {
            tables
                .requests
                .insert((row.room_id.clone(), row.song_id.clone()), row);
        }

        tables.rooms.insert(room.id.clone(), room);

        Ok(())
    }

    async fn metadata_by_ids(&self, song_ids: &[SongId]) -> Result<Vec<Metadata>> {
        self.ensure_available()?;

        let tables = self.tables.lock();

        let found = song_ids
            .iter()
            .filter_map(|id| tables.songs.get(id.as_str()))
            .cloned()
            .map(MetadataRow::into_metadata)
            .collect();

        Ok(found)
    }

    async fn upsert_metadata(&self, metadata: Metadata) -> Result<()> {
        self.ensure_available()?;

        let row = MetadataRow::from_metadata(&metadata);
        self.tables.lock().songs.insert(row.song_id.clone(), row);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use partyqueue_core::{from_epoch_millis as at, RequestState};

    use super::*;

    fn new_room(id: &str) -> NewRoom {
        NewRoom {
            id: id.into(),
            host_token: "token".to_string(),
            created_at: at(0),
        }
    }

    fn request(song: &str, state: RequestState) -> Request {
        Request {
            room_id: "room".into(),
            song_id: song.into(),
            duration: 1_000,
            votes: 1,
            state,
        }
    }

    #[tokio::test]
    async fn test_create_room_conflicts() {
        let db = MemoryDatabase::new();

        db.create_room(new_room("room")).await.expect("room is created");
        let result = db.create_room(new_room("room")).await;

        assert!(
            matches!(result, Err(DatabaseError::Conflict { .. })),
            "same id conflicts"
        );
    }

    #[tokio::test]
    async fn test_concurrent_creates_conflict() {
        let db = MemoryDatabase::new();

        let (first, second) = tokio::join!(
            db.create_room(new_room("room")),
            db.create_room(NewRoom {
                host_token: "other".to_string(),
                ..new_room("room")
            })
        );

        assert!(first.is_ok() != second.is_ok(), "exactly one create wins");

        let winner = first.or(second).unwrap();
        let stored = db.room_by_id(&"room".into()).await.unwrap();

        assert_eq!(stored.host_token, winner.host_token, "the winner is not overwritten");
    }

    #[tokio::test]
    async fn test_commit_and_partitions() {
        let db = MemoryDatabase::new();
        let room = db.create_room(new_room("room")).await.unwrap();

        db.commit_room(RoomChanges {
            room: room.clone(),
            upserted: vec![
                request("b", RequestState::Waiting { priority: 1, time: at(2) }),
                request("a", RequestState::Waiting { priority: 0, time: at(3) }),
                request("p", RequestState::Playing { started_at: at(1) }),
            ],
            removed: vec![],
        })
        .await
        .unwrap();

        let waiting: Vec<_> = db
            .requests_by_room(&room.id, RequestPartition::Waiting)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.song_id.to_string())
            .collect();

        let playing = db
            .requests_by_room(&room.id, RequestPartition::Playing)
            .await
            .unwrap();

        assert_eq!(waiting, ["a", "b"], "waiting requests are ordered");
        assert_eq!(playing.len(), 1, "one request is playing");
        assert!(playing[0].is_playing(), "playing request maps back as playing");

        db.commit_room(RoomChanges {
            room: room.clone(),
            upserted: vec![],
            removed: vec!["p".into()],
        })
        .await
        .unwrap();

        let all = db
            .requests_by_room(&room.id, RequestPartition::All)
            .await
            .unwrap();

        assert_eq!(all.len(), 2, "removed request is gone");
    }

    #[tokio::test]
    async fn test_unavailable() {
        let db = MemoryDatabase::new();
        let room = db.create_room(new_room("room")).await.unwrap();

        db.set_unavailable(true);

        let result = db
            .commit_room(RoomChanges {
                room,
                upserted: vec![request("a", RequestState::Waiting { priority: 0, time: at(0) })],
                removed: vec![],
            })
            .await;

        assert!(matches!(result, Err(DatabaseError::Internal(_))), "commit fails");

        db.set_unavailable(false);

        let all = db
            .requests_by_room(&"room".into(), RequestPartition::All)
            .await
            .unwrap();

        assert!(all.is_empty(), "nothing was written");
    }

    #[tokio::test]
    async fn test_unstorable_commit_writes_nothing() {
        let db = MemoryDatabase::new();
        let room = db.create_room(new_room("room")).await.unwrap();

        let mut long = request("long", RequestState::Waiting { priority: 1, time: at(0) });
        long.duration = u64::MAX;

        let result = db
            .commit_room(RoomChanges {
                room,
                upserted: vec![
                    request("a", RequestState::Waiting { priority: 0, time: at(0) }),
                    long,
                ],
                removed: vec![],
            })
            .await;

        assert!(matches!(result, Err(DatabaseError::Malformed { .. })), "commit fails");

        let all = db
            .requests_by_room(&"room".into(), RequestPartition::All)
            .await
            .unwrap();

        assert!(all.is_empty(), "the storable request was not written either");
    }

    #[tokio::test]
    async fn test_metadata_lookup() {
        let db = MemoryDatabase::new();

        db.upsert_metadata(Metadata {
            song_id: "a".into(),
            title: "Title".to_string(),
            artist: "Artist".to_string(),
            popularity: 3,
            last_requested: None,
            image: None,
        })
        .await
        .unwrap();

        let found = db
            .metadata_by_ids(&["a".into(), "missing".into()])
            .await
            .unwrap();

        assert_eq!(found.len(), 1, "unknown songs are left out");
        assert_eq!(found[0].title, "Title");
    }
}
