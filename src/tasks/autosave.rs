use crate::engine::Engine;
use log::info;
use std::sync::Arc;
use tokio::time::interval;

/// Safety-net save on a fixed interval, on top of the saves the persister makes on request.
pub async fn run_autosave(engine: Arc<Engine>) {
    let period = engine.config().autosave_interval;
    info!("Auto-save started - saving every {} seconds", period.as_secs());

    let mut interval = interval(period);
    // The first tick fires immediately and startup has just saved
    interval.tick().await;

    loop {
        interval.tick().await;
        engine.persist().await;
    }
}
