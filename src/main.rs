mod logging;

use std::{env, str::FromStr, sync::Arc};

use anyhow::Context;
use log::{info, warn};
use partyqueue_collab::{Collab, Database, MemoryDatabase, PgDatabase};
use partyqueue_core::Config;
use partyqueue_server::{run_server, DEFAULT_PORT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let verbose = env::var("PARTYQUEUE_LOG").is_ok_and(|level| level == "debug");
    logging::init_logger(verbose)?;

    let port = env_or("PARTYQUEUE_SERVER_PORT", DEFAULT_PORT)?;
    let mut config = Config::default();

    if let Ok(millis) = env::var("PARTYQUEUE_TICK_MS") {
        let millis = millis
            .parse()
            .context("PARTYQUEUE_TICK_MS must be a number of milliseconds")?;

        config = config.with_finish_check_millis(millis);
    }

    let database: Arc<dyn Database> = match env::var("DATABASE_URL") {
        Ok(url) => {
            info!("Connecting to database...");
            Arc::new(PgDatabase::new(&url).await?)
        }
        Err(_) => {
            warn!("DATABASE_URL is not set, rooms will only live in memory");
            Arc::new(MemoryDatabase::new())
        }
    };

    let collab = Arc::new(Collab::new(config, database));

    collab
        .rooms
        .restore()
        .await
        .context("Rooms could not be restored")?;

    let _watcher = collab.rooms.spawn_finish_watcher();

    run_server(collab, port).await?;
    Ok(())
}

fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, value)),
        Err(_) => Ok(default),
    }
}
