use async_trait::async_trait;
use partyqueue_core::{Request, RoomId, SongId};
use sqlx::{
    migrate::Migrator, postgres::PgPoolOptions, query, query_as, Error as SqlxError, PgPool,
};

use crate::{
    Database, DatabaseError, DatabaseResult, IntoDatabaseError, Metadata, MetadataRow, NewRoom,
    RequestPartition, RequestRow, Result, RoomChanges, RoomData, RoomRow,
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// A postgres database implementation for partyqueue
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connects to the database and brings its schema up to date
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        query_as::<_, RoomRow>("SELECT * FROM rooms ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?
            .into_iter()
            .map(RoomRow::into_data)
            .collect()
    }

    async fn room_by_id(&self, room_id: &RoomId) -> Result<RoomData> {
        query_as::<_, RoomRow>("SELECT * FROM rooms WHERE id = $1")
            .bind(room_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))?
            .into_data()
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        self.room_by_id(&new_room.id)
            .await
            .conflict_or_ok("room", "id", new_room.id.as_str())?;

        query(
            "
            INSERT INTO rooms (id, host_token, created_at, last_used, current_duration, target_duration)
            VALUES ($1, $2, $3, $3, 0, 0)",
        )
        .bind(new_room.id.as_str())
        .bind(&new_room.host_token)
        .bind(new_room.created_at)
        .execute(&self.pool)
        .await
        // Another create with the same id can land between the check and the insert
        .map_err(|e| e.conflict_or("room", "id", new_room.id.as_str()))?;

        self.room_by_id(&new_room.id).await
    }

    async fn requests_by_room(
        &self,
        room_id: &RoomId,
        partition: RequestPartition,
    ) -> Result<Vec<Request>> {
        let filter = match partition {
            RequestPartition::All => "",
            RequestPartition::Playing => "AND priority < 0",
            RequestPartition::Waiting => "AND priority >= 0",
        };

        let sql = format!(
            "SELECT * FROM requests WHERE room_id = $1 {} ORDER BY priority, time",
            filter
        );

        let rows = query_as::<_, RequestRow>(&sql)
            .bind(room_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.into_iter().map(RequestRow::into_request).collect()
    }

    async fn commit_room(&self, changes: RoomChanges) -> Result<()> {
        let room = RoomRow::from_data(&changes.room)?;
        let upserted = changes
            .upserted
            .iter()
            .map(RequestRow::from_request)
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let updated = query(
            "UPDATE rooms SET
                last_used = $2,
                started_at = $3,
                paused_at = $4,
                current_duration = $5,
                target_duration = $6
            WHERE id = $1",
        )
        .bind(&room.id)
        .bind(room.last_used)
        .bind(room.started_at)
        .bind(room.paused_at)
        .bind(room.current_duration)
        .bind(room.target_duration)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        if updated.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        // Removals go first so a promoted request never overlaps the one it replaces
        for song_id in &changes.removed {
            query("DELETE FROM requests WHERE room_id = $1 AND song_id = $2")
                .bind(&room.id)
                .bind(song_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
        }

        for row in &upserted {
            query(
                "
                INSERT INTO requests (room_id, song_id, priority, time, duration, votes)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (room_id, song_id) DO UPDATE SET
                    priority = excluded.priority,
                    time = excluded.time,
                    duration = excluded.duration,
                    votes = excluded.votes",
            )
            .bind(&row.room_id)
            .bind(&row.song_id)
            .bind(row.priority)
            .bind(row.time)
            .bind(row.duration)
            .bind(row.votes)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;
        }

        tx.commit().await.map_err(|e| e.any())
    }

    async fn metadata_by_ids(&self, song_ids: &[SongId]) -> Result<Vec<Metadata>> {
        if song_ids.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<_> = song_ids.iter().map(|id| id.to_string()).collect();

        let rows = query_as::<_, MetadataRow>("SELECT * FROM songs WHERE song_id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(MetadataRow::into_metadata).collect())
    }

    async fn upsert_metadata(&self, metadata: Metadata) -> Result<()> {
        let row = MetadataRow::from_metadata(&metadata);

        query(
            "
            INSERT INTO songs (song_id, title, artist, popularity, last_requested, image)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (song_id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                popularity = excluded.popularity,
                last_requested = excluded.last_requested,
                image = excluded.image",
        )
        .bind(row.song_id)
        .bind(row.title)
        .bind(row.artist)
        .bind(row.popularity)
        .bind(row.last_requested)
        .bind(row.image)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }

    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str) -> DatabaseError {
        match self {
            SqlxError::Database(e) if e.is_unique_violation() => DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            },
            e => Self::any(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, fmt};

    use sqlx::error::{DatabaseError as SqlxDatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct ConstraintError {
        unique: bool,
    }

    impl fmt::Display for ConstraintError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "constraint violated")
        }
    }

    impl Error for ConstraintError {}

    impl SqlxDatabaseError for ConstraintError {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::Other
            }
        }
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let error = SqlxError::Database(Box::new(ConstraintError { unique: true }));

        assert!(
            matches!(
                error.conflict_or("room", "id", "party"),
                DatabaseError::Conflict { value, .. } if value == "party"
            ),
            "a duplicate key is a conflict"
        );
    }

    #[test]
    fn test_other_errors_stay_internal() {
        let other = SqlxError::Database(Box::new(ConstraintError { unique: false }));

        assert!(matches!(
            other.conflict_or("room", "id", "party"),
            DatabaseError::Internal(_)
        ));
        assert!(
            matches!(
                SqlxError::RowNotFound.conflict_or("room", "id", "party"),
                DatabaseError::Internal(_)
            ),
            "only constraint violations conflict"
        );
    }
}
