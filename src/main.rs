mod commands;
mod config;
mod db;
mod engine;
mod error;
mod events;
mod handlers;
mod models;
mod tasks;
mod voting;

use commands::{HELP, run_console};
use config::Config;
use db::{JsonFileStore, MemoryStore, StateStore};
use engine::Engine;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    // Initialize logging
    env_logger::init();

    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    info!(
        "Rounds last {}s, step {} within [{}, {}], data in {}",
        config.round_duration.as_secs(),
        config.rules.step_size,
        config.rules.lower_bound,
        config.rules.upper_bound,
        config.data_file.display()
    );

    let store: Arc<dyn StateStore> = if config.in_memory {
        info!("Running without persistence, state is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(JsonFileStore::new(&config.data_file))
    };
    let engine = Arc::new(Engine::start(config, store).await);

    // --- Background tasks ---
    let background = vec![
        tokio::spawn(tasks::round_timer::run_round_timer(Arc::clone(&engine))),
        tokio::spawn(tasks::persister::run_persister(Arc::clone(&engine))),
        tokio::spawn(tasks::autosave::run_autosave(Arc::clone(&engine))),
        tokio::spawn(tasks::event_logger::run_event_logger(Arc::clone(&engine))),
    ];

    println!("{}", HELP);
    let console = run_console(&engine, BufReader::new(tokio::io::stdin()), tokio::io::stdout());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        result = console => {
            // A dead console still gets an orderly shutdown
            if let Err(e) = result {
                warn!("Console closed: {}", e);
            }
        }
    }

    for task in background {
        task.abort();
    }
    engine.persist().await;
    info!("State saved, goodbye");
    Ok(())
}
