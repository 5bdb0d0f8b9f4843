use log::{debug, error};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::Database;

use super::RoomManager;

impl<Db> RoomManager<Db>
where
    Db: Database,
{
    /// Advances every room whose song has played to the end.
    /// Returns how many rooms moved on.
    pub async fn advance_finished(&self) -> usize {
        let mut advanced = 0;

        for room in self.list_all() {
            match room.advance_if_finished().await {
                Ok(true) => {
                    debug!("Room {} finished a song", room.id());
                    advanced += 1;
                }
                Ok(false) => {}
                Err(e) => error!("Room {} could not advance: {}", room.id(), e),
            }
        }

        advanced
    }

    /// Spawns a task that checks for finished songs on the configured interval.
    pub fn spawn_finish_watcher(&self) -> JoinHandle<()> {
        let manager = RoomManager::new(&self.context);
        let period = self.context.config.finish_check_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                manager.advance_finished().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use partyqueue_core::{Config, ManualTime};

    use crate::{Collab, MemoryDatabase, RoomStatus};

    #[tokio::test]
    async fn test_advance_finished() {
        let time = ManualTime::at_epoch();
        let collab = Collab::with_time(
            Config::default(),
            MemoryDatabase::new(),
            Arc::new(time.clone()),
        );

        let short = collab.rooms.create_room(Some("short".into())).await.unwrap();
        let long = collab.rooms.create_room(Some("long".into())).await.unwrap();

        short.enqueue("a".into(), 1_000).await.unwrap();
        long.enqueue("b".into(), 5_000).await.unwrap();

        time.advance_millis(1_000);

        assert_eq!(collab.rooms.advance_finished().await, 1, "only one room finished");
        assert_eq!(short.status(), RoomStatus::Idle, "short room ran out");
        assert_eq!(long.status(), RoomStatus::Playing, "long room plays on");
    }

    #[tokio::test]
    async fn test_watcher_task() {
        let time = ManualTime::at_epoch();
        let collab = Collab::with_time(
            Config::default().with_finish_check_millis(5),
            MemoryDatabase::new(),
            Arc::new(time.clone()),
        );

        let room = collab.rooms.create_room(None).await.unwrap();
        room.enqueue("a".into(), 100).await.unwrap();
        room.enqueue("b".into(), 100).await.unwrap();

        let watcher = collab.rooms.spawn_finish_watcher();
        time.advance_millis(100);

        for _ in 0..100 {
            if room.now_playing().map(|r| r.song_id.to_string()).as_deref() == Some("b") {
                break;
            }

            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        watcher.abort();

        assert_eq!(
            room.now_playing().map(|r| r.song_id.to_string()).as_deref(),
            Some("b"),
            "watcher advanced the room"
        );
    }
}
