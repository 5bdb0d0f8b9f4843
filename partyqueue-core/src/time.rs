use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub type Timestamp = DateTime<Utc>;

/// Provides the authoritative "now" for rooms.
pub trait TimeSource
where
    Self: Send + Sync + 'static,
{
    fn now(&self) -> Timestamp;
}

pub type ArcedTimeSource = Arc<dyn TimeSource>;

/// Reads the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A time source that only moves when told to. Used to drive rooms deterministically.
#[derive(Debug, Clone)]
pub struct ManualTime {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualTime {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Starts at the unix epoch, so timestamps read as plain millisecond offsets.
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn advance_millis(&self, millis: i64) {
        *self.now.lock() += Duration::milliseconds(millis);
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock() = now;
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Milliseconds since the unix epoch, handy in tests and logs.
pub fn epoch_millis(timestamp: Timestamp) -> i64 {
    timestamp.timestamp_millis()
}

/// Builds a timestamp from milliseconds since the unix epoch.
pub fn from_epoch_millis(millis: i64) -> Timestamp {
    DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(millis)
}
