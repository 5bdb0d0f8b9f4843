use partyqueue_core::{ClockState, PlaybackClock, Request, RequestState, RoomId, SongId, Timestamp};
use sqlx::FromRow;

use super::{DatabaseError, Result};

/// The priority a playing request is stored with. Waiting requests never go below zero.
pub const STORED_PLAYING_PRIORITY: i32 = -1;

/// A partyqueue room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomData {
    pub id: RoomId,
    /// Opaque credential of the room's host, never changed after creation
    pub host_token: String,
    pub created_at: Timestamp,
    /// When a transition was last committed
    pub last_used: Timestamp,
    pub clock: PlaybackClock,
}

/// Reference data about a song, owned by the metadata store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub song_id: SongId,
    pub title: String,
    pub artist: String,
    pub popularity: i32,
    pub last_requested: Option<Timestamp>,
    /// Url of the artwork, if any
    pub image: Option<String>,
}

/// A row of the `rooms` table
#[derive(Debug, Clone, FromRow)]
pub struct RoomRow {
    pub id: String,
    pub host_token: String,
    pub created_at: Timestamp,
    pub last_used: Timestamp,
    pub started_at: Option<Timestamp>,
    pub paused_at: Option<Timestamp>,
    pub current_duration: i64,
    pub target_duration: i64,
}

/// A row of the `requests` table
#[derive(Debug, Clone, FromRow)]
pub struct RequestRow {
    pub room_id: String,
    pub song_id: String,
    pub priority: i32,
    pub time: Timestamp,
    pub duration: i64,
    pub votes: i32,
}

/// A row of the `songs` table
#[derive(Debug, Clone, FromRow)]
pub struct MetadataRow {
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub popularity: i32,
    pub last_requested: Option<Timestamp>,
    pub image: Option<String>,
}

/// Converts between entity integers and their column types, rejecting values that do not fit.
fn fit<T, U>(value: T, resource: &'static str, field: &str) -> Result<U>
where
    T: Copy + std::fmt::Display,
    U: TryFrom<T>,
{
    U::try_from(value).map_err(|_| DatabaseError::Malformed {
        resource,
        reason: format!("{} of {} is out of range", field, value),
    })
}

impl RoomRow {
    pub fn from_data(data: &RoomData) -> Result<Self> {
        let clock = &data.clock;

        Ok(Self {
            id: data.id.to_string(),
            host_token: data.host_token.clone(),
            created_at: data.created_at,
            last_used: data.last_used,
            started_at: clock.started_at(),
            paused_at: clock.paused_at(),
            current_duration: fit(clock.current_duration(), "room", "current_duration")?,
            target_duration: fit(clock.target_duration(), "room", "target_duration")?,
        })
    }

    pub fn into_data(self) -> Result<RoomData> {
        let state = match (self.started_at, self.paused_at) {
            (None, None) => ClockState::Idle,
            (Some(started_at), None) => ClockState::Playing { started_at },
            (None, Some(paused_at)) => ClockState::Paused { paused_at },
            (Some(_), Some(_)) => {
                return Err(DatabaseError::Malformed {
                    resource: "room",
                    reason: format!("room {} is both playing and paused", self.id),
                })
            }
        };

        let clock = PlaybackClock::from_parts(
            state,
            fit(self.current_duration, "room", "current_duration")?,
            fit(self.target_duration, "room", "target_duration")?,
        );

        Ok(RoomData {
            id: RoomId::new(self.id),
            host_token: self.host_token,
            created_at: self.created_at,
            last_used: self.last_used,
            clock,
        })
    }
}

impl RequestRow {
    pub fn from_request(request: &Request) -> Result<Self> {
        let (priority, time) = match request.state {
            RequestState::Waiting { priority, time } => (priority, time),
            RequestState::Playing { started_at } => (STORED_PLAYING_PRIORITY, started_at),
        };

        Ok(Self {
            room_id: request.room_id.to_string(),
            song_id: request.song_id.to_string(),
            priority,
            time,
            duration: fit(request.duration, "request", "duration")?,
            votes: fit(request.votes, "request", "votes")?,
        })
    }

    pub fn into_request(self) -> Result<Request> {
        let state = if self.priority < 0 {
            RequestState::Playing {
                started_at: self.time,
            }
        } else {
            RequestState::Waiting {
                priority: self.priority,
                time: self.time,
            }
        };

        Ok(Request {
            room_id: RoomId::new(self.room_id),
            song_id: SongId::new(self.song_id),
            duration: fit(self.duration, "request", "duration")?,
            votes: fit(self.votes, "request", "votes")?,
            state,
        })
    }
}

impl MetadataRow {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            song_id: metadata.song_id.to_string(),
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            popularity: metadata.popularity,
            last_requested: metadata.last_requested,
            image: metadata.image.clone(),
        }
    }

    pub fn into_metadata(self) -> Metadata {
        Metadata {
            song_id: SongId::new(self.song_id),
            title: self.title,
            artist: self.artist,
            popularity: self.popularity,
            last_requested: self.last_requested,
            image: self.image,
        }
    }
}

#[cfg(test)]
mod tests {
    use partyqueue_core::from_epoch_millis as at;

    use super::*;

    fn room_data(clock: PlaybackClock) -> RoomData {
        RoomData {
            id: "abc".into(),
            host_token: "secret".to_string(),
            created_at: at(0),
            last_used: at(10),
            clock,
        }
    }

    #[test]
    fn test_room_row_mapping() {
        let mut clock = PlaybackClock::default();
        clock.play(60_000, at(1_000));
        clock.pause(at(4_000)).unwrap();

        let data = room_data(clock);
        let row = RoomRow::from_data(&data).unwrap();

        assert_eq!(row.started_at, None, "a paused room has no start");
        assert_eq!(row.paused_at, Some(at(4_000)), "pause time is stored");
        assert_eq!(row.current_duration, 3_000, "elapsed time is stored");
        assert_eq!(row.into_data().unwrap(), data, "the row maps back");
    }

    #[test]
    fn test_room_row_rejects_both_timestamps() {
        let mut row = RoomRow::from_data(&room_data(PlaybackClock::default())).unwrap();
        row.started_at = Some(at(1));
        row.paused_at = Some(at(2));

        assert!(
            matches!(row.into_data(), Err(DatabaseError::Malformed { .. })),
            "a row cannot be playing and paused"
        );
    }

    #[test]
    fn test_request_row_mapping() {
        let playing = Request {
            room_id: "abc".into(),
            song_id: "song".into(),
            duration: 1_000,
            votes: 3,
            state: RequestState::Playing { started_at: at(7) },
        };

        let row = RequestRow::from_request(&playing).unwrap();

        assert_eq!(row.priority, STORED_PLAYING_PRIORITY, "playing uses the sentinel");
        assert_eq!(row.time, at(7), "start time is stored as time");
        assert_eq!(row.into_request().unwrap(), playing, "the row maps back");

        let waiting = Request {
            state: RequestState::Waiting {
                priority: 4,
                time: at(9),
            },
            ..playing
        };

        assert_eq!(
            RequestRow::from_request(&waiting).unwrap().into_request().unwrap(),
            waiting,
            "waiting requests map back"
        );
    }

    #[test]
    fn test_durations_beyond_columns_are_rejected() {
        let request = Request {
            room_id: "abc".into(),
            song_id: "long".into(),
            duration: i64::MAX as u64 + 1,
            votes: 1,
            state: RequestState::Waiting {
                priority: 0,
                time: at(0),
            },
        };

        assert!(
            matches!(RequestRow::from_request(&request), Err(DatabaseError::Malformed { .. })),
            "a duration that would wrap is not stored"
        );

        let mut clock = PlaybackClock::default();
        clock.play(i64::MAX as u64 + 1, at(0));

        assert!(
            matches!(RoomRow::from_data(&room_data(clock)), Err(DatabaseError::Malformed { .. })),
            "the clock target is checked too"
        );

        let mut row = RequestRow::from_request(&Request {
            duration: 1_000,
            ..request
        })
        .unwrap();
        row.duration = -1;

        assert!(
            matches!(row.into_request(), Err(DatabaseError::Malformed { .. })),
            "negative stored durations are not read as zero"
        );
    }

    #[test]
    fn test_largest_duration_maps_back() {
        let mut clock = PlaybackClock::default();
        clock.play(i64::MAX as u64, at(0));

        let data = room_data(clock);
        let row = RoomRow::from_data(&data).unwrap();

        assert_eq!(row.target_duration, i64::MAX);
        assert_eq!(row.into_data().unwrap(), data, "the largest duration survives");
    }
}
