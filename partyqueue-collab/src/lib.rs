mod db;
mod events;
mod metadata;
mod rooms;
mod util;

use std::sync::Arc;

use dashmap::DashMap;
use log::warn;

pub use db::*;
pub use events::*;
pub use metadata::*;
pub use rooms::*;

use partyqueue_core::{
    vote_weighted_boost, ArcedTimeSource, BoostPolicy, Config, RoomId, SystemTime,
};

pub type ArcedStore<K, V> = Arc<DashMap<K, Arc<V>>>;

/// The partyqueue collab system, facilitating rooms, their queues, and song metadata.
pub struct Collab<Db> {
    context: CollabContext<Db>,
    event_receiver: EventReceiver,

    pub rooms: RoomManager<Db>,
}

/// A type passed to various components of the collab system, to access state and emit events.
pub struct CollabContext<Db> {
    pub config: Config,
    pub database: Arc<Db>,
    pub time: ArcedTimeSource,
    /// How boosting changes the priority of a waiting request
    pub policy: BoostPolicy,

    pub rooms: ArcedStore<RoomId, Room<Db>>,
    event_sender: EventSender,
}

impl<Db> Collab<Db>
where
    Db: Database,
{
    pub fn new(config: Config, database: Db) -> Self {
        Self::with_time(config, database, Arc::new(SystemTime))
    }

    pub fn with_time(config: Config, database: Db, time: ArcedTimeSource) -> Self {
        Self::with_parts(config, database, time, vote_weighted_boost())
    }

    pub fn with_parts(
        config: Config,
        database: Db,
        time: ArcedTimeSource,
        policy: BoostPolicy,
    ) -> Self {
        let (event_sender, event_receiver) = crossbeam::channel::unbounded();

        let context = CollabContext {
            config,
            database: Arc::new(database),
            time,
            policy,
            rooms: Default::default(),
            event_sender,
        };

        let room_manager = RoomManager::new(&context);

        Self {
            context,
            event_receiver,
            rooms: room_manager,
        }
    }

    pub fn database(&self) -> &Db {
        &self.context.database
    }

    /// Returns a receiver of every committed change. Each event goes to one receiver.
    pub fn events(&self) -> EventReceiver {
        self.event_receiver.clone()
    }

    /// Looks up song metadata on behalf of readers.
    pub fn metadata(&self) -> MetadataJoiner<'_, Db> {
        MetadataJoiner::new(&self.context.database)
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }
}

impl<Db> CollabContext<Db> {
    pub fn emit(&self, event: CollabEvent) {
        if let Err(error) = self.event_sender.send(event) {
            warn!("Event was dropped: {}", error);
        }
    }
}

impl<Db> Clone for CollabContext<Db> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            database: self.database.clone(),
            time: self.time.clone(),
            policy: self.policy.clone(),
            rooms: self.rooms.clone(),
            event_sender: self.event_sender.clone(),
        }
    }
}
