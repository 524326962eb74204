use log::info;
use std::sync::Arc;
use std::time::Duration;

use momserver::config::AppConfig;
use momserver::pipeline::MeetingProcessor;
use momserver::scheduler::ReminderScheduler;
use momserver::store::{SqliteStore, StateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::load()?;
    info!("Opening state store at {}", config.store.path.display());
    let store: Arc<dyn StateStore> = Arc::new(SqliteStore::open(&config.store.path)?);

    let processor = MeetingProcessor::new(&config, store.clone());
    let scheduler = Arc::new(ReminderScheduler::with_tick_interval(
        store,
        processor.distribution.clone(),
        Duration::from_secs(config.scheduler.tick_secs),
    ));
    scheduler.start();
    info!("momserver running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    scheduler.stop();
    Ok(())
}
