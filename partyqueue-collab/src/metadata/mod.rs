use std::collections::{HashMap, HashSet};

use partyqueue_core::{Request, SongId};

use crate::{Database, DatabaseError, Metadata};

/// A request with its song metadata, if the metadata store knows the song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub request: Request,
    pub metadata: Option<Metadata>,
}

/// Attaches song metadata to requests in one batched lookup.
///
/// Metadata is reference data owned by another system, so a song without it is not an error.
pub struct MetadataJoiner<'a, Db> {
    database: &'a Db,
}

impl<'a, Db> MetadataJoiner<'a, Db>
where
    Db: Database,
{
    pub fn new(database: &'a Db) -> Self {
        Self { database }
    }

    /// Looks up metadata for the given songs, keyed by song id.
    pub async fn lookup(&self, song_ids: &[SongId]) -> Result<HashMap<SongId, Metadata>, DatabaseError> {
        let mut seen = HashSet::new();
        let unique: Vec<_> = song_ids
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();

        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let found = self.database.metadata_by_ids(&unique).await?;

        Ok(found
            .into_iter()
            .map(|m| (m.song_id.clone(), m))
            .collect())
    }

    /// Pairs each request with its metadata, keeping the order of `requests`.
    pub async fn join(&self, requests: Vec<Request>) -> Result<Vec<Joined>, DatabaseError> {
        let ids: Vec<_> = requests.iter().map(|r| r.song_id.clone()).collect();
        let mut found = self.lookup(&ids).await?;

        let joined = requests
            .into_iter()
            .map(|request| Joined {
                // Song ids are unique within a room, so each entry is taken once
                metadata: found.remove(&request.song_id),
                request,
            })
            .collect();

        Ok(joined)
    }
}
