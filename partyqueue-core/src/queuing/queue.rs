use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use thiserror::Error;

use crate::{
    vote_weighted_boost, BoostPolicy, Request, RequestState, RoomId, SongId, Timestamp,
    MIN_WAITING_PRIORITY,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Song {0} is not in the queue")]
    NotFound(SongId),
    #[error("Song {0} is not waiting")]
    NotWaiting(SongId),
    #[error("Song {playing} is already playing")]
    AlreadyPlaying { playing: SongId },
    #[error("Songs {first} and {second} are both marked as playing")]
    MultiplePlaying { first: SongId, second: SongId },
}

/// What happened when a song was enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The song was new and appended to the back
    Inserted,
    /// The song was already live in the room and got boosted instead
    Boosted,
}

/// The result of advancing a queue past its now playing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advanced {
    /// The request that stopped playing, if any
    pub finished: Option<Request>,
    /// The request that started playing, if any
    pub promoted: Option<Request>,
}

/// Position of a waiting request. Ties on priority and time fall back to insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct WaitingKey {
    priority: i32,
    time: Timestamp,
    seq: u64,
}

#[derive(Debug, Clone)]
struct Slot {
    request: Request,
    seq: u64,
}

impl Slot {
    fn key(&self) -> Option<WaitingKey> {
        match self.request.state {
            RequestState::Waiting { priority, time } => Some(WaitingKey {
                priority,
                time,
                seq: self.seq,
            }),
            RequestState::Playing { .. } => None,
        }
    }
}

/// The requests of a single room, keyed by song.
///
/// At most one request is playing. The rest wait in `(priority, time)` order.
#[derive(Clone)]
pub struct RequestQueue {
    room_id: RoomId,
    policy: BoostPolicy,
    slots: HashMap<SongId, Slot>,
    waiting: BTreeMap<WaitingKey, SongId>,
    playing: Option<SongId>,
    next_seq: u64,
}

impl RequestQueue {
    pub fn new(room_id: RoomId) -> Self {
        Self::with_policy(room_id, vote_weighted_boost())
    }

    pub fn with_policy(room_id: RoomId, policy: BoostPolicy) -> Self {
        Self {
            room_id,
            policy,
            slots: Default::default(),
            waiting: Default::default(),
            playing: None,
            next_seq: 0,
        }
    }

    /// Rebuilds a queue from stored requests.
    pub fn restore<I>(room_id: RoomId, policy: BoostPolicy, requests: I) -> Result<Self, QueueError>
    where
        I: IntoIterator<Item = Request>,
    {
        let mut requests: Vec<_> = requests.into_iter().collect();

        // Stored rows have no insertion sequence, so derive one from their order
        requests.sort_by(|a, b| {
            (a.priority(), a.time(), &a.song_id).cmp(&(b.priority(), b.time(), &b.song_id))
        });

        let mut queue = Self::with_policy(room_id.clone(), policy);

        for mut request in requests {
            request.room_id = room_id.clone();

            if let RequestState::Waiting { priority, time } = request.state {
                request.state = RequestState::Waiting {
                    priority: priority.max(MIN_WAITING_PRIORITY),
                    time,
                };
            }

            if request.is_playing() {
                if let Some(first) = &queue.playing {
                    return Err(QueueError::MultiplePlaying {
                        first: first.clone(),
                        second: request.song_id,
                    });
                }

                queue.playing = Some(request.song_id.clone());
            }

            queue.insert_slot(request);
        }

        Ok(queue)
    }

    /// Adds a song to the back of the queue, or boosts it if it is already live in the room.
    pub fn enqueue(
        &mut self,
        song_id: SongId,
        duration: u64,
        now: Timestamp,
    ) -> Result<Enqueued, QueueError> {
        if self.slots.contains_key(&song_id) {
            return self.boost(&song_id, now).map(|_| Enqueued::Boosted);
        }

        let priority = self
            .waiting
            .last_key_value()
            .map(|(key, _)| key.priority + 1)
            .unwrap_or(MIN_WAITING_PRIORITY);

        self.insert_slot(Request {
            room_id: self.room_id.clone(),
            song_id,
            duration,
            votes: 1,
            state: RequestState::Waiting {
                priority,
                time: now,
            },
        });

        Ok(Enqueued::Inserted)
    }

    /// Counts another vote for a song and, if it is waiting, moves it according to the boost policy.
    pub fn boost(&mut self, song_id: &SongId, now: Timestamp) -> Result<&Request, QueueError> {
        let slot = self
            .slots
            .get_mut(song_id)
            .ok_or_else(|| QueueError::NotFound(song_id.clone()))?;

        slot.request.votes = slot.request.votes.saturating_add(1);

        if let Some(old_key) = slot.key() {
            let priority = (self.policy)(old_key.priority, slot.request.votes);

            slot.request.state = RequestState::Waiting {
                priority: priority.max(MIN_WAITING_PRIORITY),
                time: now,
            };

            self.waiting.remove(&old_key);

            if let Some(new_key) = slot.key() {
                self.waiting.insert(new_key, song_id.clone());
            }
        }

        Ok(&slot.request)
    }

    /// Returns the waiting request that would play next.
    pub fn peek_next(&self) -> Option<&Request> {
        self.waiting
            .values()
            .next()
            .and_then(|song_id| self.get(song_id))
    }

    /// Moves a waiting request to now playing.
    pub fn promote_to_playing(
        &mut self,
        song_id: &SongId,
        now: Timestamp,
    ) -> Result<&Request, QueueError> {
        let key = self
            .slots
            .get(song_id)
            .ok_or_else(|| QueueError::NotFound(song_id.clone()))?
            .key()
            .ok_or_else(|| QueueError::NotWaiting(song_id.clone()))?;

        if let Some(playing) = &self.playing {
            return Err(QueueError::AlreadyPlaying {
                playing: playing.clone(),
            });
        }

        self.waiting.remove(&key);
        self.playing = Some(song_id.clone());

        let slot = self
            .slots
            .get_mut(song_id)
            .ok_or_else(|| QueueError::NotFound(song_id.clone()))?;

        slot.request.state = RequestState::Playing { started_at: now };

        Ok(&slot.request)
    }

    /// Removes the now playing request, if there is one.
    pub fn remove_now_playing(&mut self) -> Option<Request> {
        let song_id = self.playing.take()?;
        self.slots.remove(&song_id).map(|slot| slot.request)
    }

    /// Removes the now playing request and promotes the next waiting one in its place.
    pub fn advance(&mut self, now: Timestamp) -> Advanced {
        let finished = self.remove_now_playing();
        let next = self.peek_next().map(|r| r.song_id.clone());

        let mut promoted = None;

        if let Some(song_id) = next {
            promoted = self.promote_to_playing(&song_id, now).ok().cloned();
        }

        Advanced { finished, promoted }
    }

    /// Iterates the waiting requests in play order. The iterator can be cloned to start over.
    pub fn list_waiting(&self) -> impl Iterator<Item = &Request> + Clone + '_ {
        self.waiting
            .values()
            .filter_map(|song_id| self.slots.get(song_id))
            .map(|slot| &slot.request)
    }

    pub fn now_playing(&self) -> Option<&Request> {
        self.playing.as_ref().and_then(|song_id| self.get(song_id))
    }

    pub fn get(&self, song_id: &SongId) -> Option<&Request> {
        self.slots.get(song_id).map(|slot| &slot.request)
    }

    /// Iterates every live request, playing and waiting, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Request> + '_ {
        self.slots.values().map(|slot| &slot.request)
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn has_waiting(&self) -> bool {
        !self.waiting.is_empty()
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    fn insert_slot(&mut self, request: Request) {
        let song_id = request.song_id.clone();
        let slot = Slot {
            request,
            seq: self.next_seq,
        };

        self.next_seq += 1;

        if let Some(key) = slot.key() {
            self.waiting.insert(key, song_id.clone());
        }

        self.slots.insert(song_id, slot);
    }
}

impl Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("room_id", &self.room_id)
            .field("playing", &self.playing)
            .field("waiting", &self.waiting.values().collect::<Vec<_>>())
            .finish()
    }
}
