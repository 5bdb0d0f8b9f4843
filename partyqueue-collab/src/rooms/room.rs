use std::collections::HashSet;

use log::{info, warn};
use parking_lot::RwLock;
use partyqueue_core::{
    ClockState, Enqueued, Request, RequestQueue, RoomId, SongId, TimeSource, Timestamp,
};
use tokio::sync::Mutex;

use crate::{
    events::CollabEvent, CollabContext, Database, Joined, MetadataJoiner, RoomChanges, RoomData,
};

use super::RoomError;

/// Whether a room is playing anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Idle,
    Playing,
    Paused,
}

/// The committed state of a room. Transitions work on a copy and swap it in once stored.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub data: RoomData,
    pub queue: RequestQueue,
}

/// A consistent view of a room at one instant.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room: RoomData,
    pub status: RoomStatus,
    /// Milliseconds left of the now playing song
    pub remaining: u64,
    pub now_playing: Option<Request>,
    /// Waiting requests in play order
    pub waiting: Vec<Request>,
    pub taken_at: Timestamp,
}

/// A partyqueue room, coordinating its playback clock and request queue.
///
/// Every mutation runs one at a time per room and is stored before it becomes visible.
pub struct Room<Db> {
    context: CollabContext<Db>,
    id: RoomId,
    state: RwLock<RoomState>,
    /// Serializes transitions, held across the database write
    transitions: Mutex<()>,
}

impl RoomState {
    pub fn status(&self) -> RoomStatus {
        match self.data.clock.state() {
            ClockState::Idle => RoomStatus::Idle,
            ClockState::Playing { .. } => RoomStatus::Playing,
            ClockState::Paused { .. } => RoomStatus::Paused,
        }
    }

    /// Replaces the now playing request with the next waiting one, starting its clock.
    /// Goes idle if nothing is waiting.
    fn advance(&mut self, now: Timestamp) -> Option<Request> {
        let advanced = self.queue.advance(now);

        match &advanced.promoted {
            Some(request) => self.data.clock.play(request.duration, now),
            None => self.data.clock.stop(),
        }

        advanced.promoted
    }

    fn waiting_ids(&self) -> Vec<(SongId, Option<i32>)> {
        self.queue
            .list_waiting()
            .map(|r| (r.song_id.clone(), r.priority()))
            .collect()
    }
}

impl RoomStatus {
    fn name(&self) -> &'static str {
        match self {
            RoomStatus::Idle => "idle",
            RoomStatus::Playing => "playing",
            RoomStatus::Paused => "paused",
        }
    }
}

impl RoomChanges {
    /// Collects what changed between two states of the same room.
    pub fn between(before: &RoomState, after: &RoomState) -> Self {
        let live: HashSet<_> = after.queue.iter().map(|r| &r.song_id).collect();

        let removed = before
            .queue
            .iter()
            .filter(|r| !live.contains(&r.song_id))
            .map(|r| r.song_id.clone())
            .collect();

        let upserted = after
            .queue
            .iter()
            .filter(|r| before.queue.get(&r.song_id) != Some(*r))
            .cloned()
            .collect();

        Self {
            room: after.data.clone(),
            upserted,
            removed,
        }
    }

    pub fn touches_requests(&self) -> bool {
        !self.upserted.is_empty() || !self.removed.is_empty()
    }
}

impl<Db> Room<Db>
where
    Db: Database,
{
    pub fn new(context: &CollabContext<Db>, data: RoomData, queue: RequestQueue) -> Self {
        Self {
            context: context.clone(),
            id: data.id.clone(),
            state: RwLock::new(RoomState { data, queue }),
            transitions: Default::default(),
        }
    }

    /// Adds a song to the queue, or boosts it if it is already live in the room.
    /// An idle room with nothing waiting starts playing the song right away.
    ///
    /// Returns the request as it was committed, playing or waiting.
    pub async fn enqueue(
        &self,
        song_id: SongId,
        duration: u64,
    ) -> Result<(Enqueued, Request), RoomError> {
        let (result, request) = self
            .transition(|state, now| {
                let result = state.queue.enqueue(song_id.clone(), duration, now)?;

                let is_first = result == Enqueued::Inserted && state.queue.waiting_len() == 1;

                if is_first && state.status() == RoomStatus::Idle {
                    state.advance(now);
                }

                let request = state.queue.get(&song_id).cloned().ok_or_else(|| {
                    RoomError::NotFound {
                        resource: "song",
                        identifier: song_id.to_string(),
                    }
                })?;

                Ok((result, request))
            })
            .await?;

        info!("Song {} was {:?} in room {}", song_id, result, self.id);
        Ok((result, request))
    }

    /// Moves a live request closer to the front of the queue.
    pub async fn boost(&self, song_id: &SongId) -> Result<Request, RoomError> {
        self.transition(|state, now| Ok(state.queue.boost(song_id, now)?.clone()))
            .await
    }

    pub async fn pause(&self) -> Result<(), RoomError> {
        self.transition(|state, now| Ok(state.data.clock.pause(now)?))
            .await?;

        info!("Room {} paused", self.id);
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), RoomError> {
        self.transition(|state, now| Ok(state.data.clock.resume(now)?))
            .await?;

        info!("Room {} resumed", self.id);
        Ok(())
    }

    /// Ends the now playing song early and moves on to the next one.
    ///
    /// If `expected` is given and another song is playing, nothing happens. This keeps two
    /// clients that skip at the same time from skipping two songs.
    pub async fn skip(&self, expected: Option<&SongId>) -> Result<Option<Request>, RoomError> {
        let promoted = self
            .transition(|state, now| {
                let status = state.status();

                if status == RoomStatus::Idle {
                    return Err(RoomError::InvalidTransition {
                        action: "skip",
                        state: status.name(),
                    });
                }

                let playing = state.queue.now_playing().map(|r| &r.song_id);

                if let Some(expected) = expected {
                    if playing != Some(expected) {
                        return Err(RoomError::NotFound {
                            resource: "playing song",
                            identifier: expected.to_string(),
                        });
                    }
                }

                Ok(state.advance(now))
            })
            .await?;

        info!("Room {} skipped a song", self.id);
        Ok(promoted)
    }

    /// Moves on to the next song if the current one has played to the end.
    /// Returns true if the room advanced.
    pub async fn advance_if_finished(&self) -> Result<bool, RoomError> {
        if !self.is_finished() {
            return Ok(false);
        }

        self.transition(|state, now| {
            // Another transition may have won the race for the lock
            if !state.data.clock.is_finished(now) {
                return Ok(false);
            }

            state.advance(now);
            Ok(true)
        })
        .await
    }

    /// Returns a consistent view of the room.
    pub fn snapshot(&self) -> RoomSnapshot {
        let now = self.context.time.now();
        let state = self.state.read();

        RoomSnapshot {
            room: state.data.clone(),
            status: state.status(),
            remaining: state.data.clock.remaining(now),
            now_playing: state.queue.now_playing().cloned(),
            waiting: state.queue.list_waiting().cloned().collect(),
            taken_at: now,
        }
    }

    pub fn status(&self) -> RoomStatus {
        self.state.read().status()
    }

    /// Milliseconds left of the now playing song
    pub fn remaining(&self) -> u64 {
        let now = self.context.time.now();
        self.state.read().data.clock.remaining(now)
    }

    pub fn now_playing(&self) -> Option<Request> {
        self.state.read().queue.now_playing().cloned()
    }

    /// Waiting requests in play order
    pub fn list_queue(&self) -> Vec<Request> {
        self.state.read().queue.list_waiting().cloned().collect()
    }

    /// Waiting requests in play order, with their metadata attached.
    pub async fn joined_queue(&self) -> Result<Vec<Joined>, RoomError> {
        let queue = self.list_queue();

        MetadataJoiner::new(&self.context.database)
            .join(queue)
            .await
            .map_err(RoomError::PersistenceFailure)
    }

    pub fn data(&self) -> RoomData {
        self.state.read().data.clone()
    }

    pub fn id(&self) -> RoomId {
        self.id.clone()
    }

    fn is_finished(&self) -> bool {
        let now = self.context.time.now();
        self.state.read().data.clock.is_finished(now)
    }

    /// Applies a change to a copy of the room, stores it, then makes it visible.
    ///
    /// If `apply` or the database fails, the room is left as it was.
    async fn transition<F, T>(&self, apply: F) -> Result<T, RoomError>
    where
        F: FnOnce(&mut RoomState, Timestamp) -> Result<T, RoomError>,
    {
        let _guard = self.transitions.lock().await;

        let now = self.context.time.now();
        let before = self.state.read().clone();

        let mut after = before.clone();
        let output = apply(&mut after, now)?;

        let clock_changed = before.data.clock != after.data.clock;
        let mut changes = RoomChanges::between(&before, &after);

        if !clock_changed && !changes.touches_requests() {
            return Ok(output);
        }

        after.data.last_used = now;
        changes.room.last_used = now;

        if let Err(error) = self.context.database.commit_room(changes).await {
            warn!("Room {} could not be stored: {}", self.id, error);
            return Err(RoomError::PersistenceFailure(error));
        }

        *self.state.write() = after.clone();
        self.emit_changes(&before, &after, now);

        Ok(output)
    }

    fn emit_changes(&self, before: &RoomState, after: &RoomState, now: Timestamp) {
        let before_playing = before.queue.now_playing().map(|r| &r.song_id);
        let after_playing = after.queue.now_playing().map(|r| &r.song_id);

        if before_playing != after_playing {
            self.context.emit(CollabEvent::NowPlayingUpdate {
                room_id: self.id(),
                song_id: after_playing.cloned(),
            });
        }

        if before.data.clock != after.data.clock {
            self.context.emit(CollabEvent::RoomStatusUpdate {
                room_id: self.id(),
                new_status: after.status(),
                remaining: after.data.clock.remaining(now),
            });
        }

        if before.waiting_ids() != after.waiting_ids() {
            self.context.emit(CollabEvent::QueueUpdate { room_id: self.id() });
        }
    }
}
