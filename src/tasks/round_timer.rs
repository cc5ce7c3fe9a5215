use crate::engine::{CloseOutcome, Engine};
use crate::error::EngineError;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};

/// Closes the active round whenever its deadline passes. Runs until the task is aborted.
pub async fn run_round_timer(engine: Arc<Engine>) {
    let tick = engine.config().tick_interval;
    info!("Starting round timer, checking every {}ms", tick.as_millis());

    let mut interval = interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        check_round(&engine).await;
    }
}

/// One timer step. Returns the outcome if a close was attempted.
pub async fn check_round(engine: &Engine) -> Option<Result<CloseOutcome, EngineError>> {
    let round_number = engine.expired_round(Utc::now()).await?;
    debug!("Round {} has run out of time", round_number);

    let result = engine.close_round(round_number).await;
    match &result {
        Ok(outcome) => {
            if let CloseOutcome::Committed(close) = outcome {
                let votes = outcome.vote_summary();
                info!(
                    "Round {} closed by timer with {} vote(s), round {} started",
                    round_number, votes.total_votes, close.next_round_number
                );
            }
        }
        // Someone else is closing this round; the next tick will see the new deadline
        Err(EngineError::AlreadyProcessing) => warn!("Round {} is already being closed", round_number),
        Err(e) => error!("Error closing round {}: {}", round_number, e),
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::MemoryStore;
    use crate::models::{PersistedState, RoundClockState};
    use std::time::Duration;

    #[tokio::test]
    async fn leaves_running_round_alone() {
        let engine = Engine::start(Config::default(), Arc::new(MemoryStore::new())).await;
        assert!(check_round(&engine).await.is_none());
        assert_eq!(engine.active_round_number().await, 1);
    }

    #[tokio::test]
    async fn closes_an_overdue_round_once() {
        // Saved state from a process that stopped ten minutes ago
        let stale = PersistedState {
            history: vec![crate::models::HistoryEntry::seed(75.0)],
            vote_log: Vec::new(),
            score: 75.0,
            clock: RoundClockState {
                active_round_number: 1,
                round_started_at: Utc::now() - chrono::Duration::minutes(10),
            },
        };
        let engine = Engine::start(Config::default(), Arc::new(MemoryStore::with_state(stale))).await;

        let outcome = check_round(&engine).await.unwrap().unwrap();
        assert!(matches!(outcome, CloseOutcome::Committed(_)));
        assert_eq!(engine.active_round_number().await, 2);

        // The next round starts now rather than back-filling missed minutes
        assert!(check_round(&engine).await.is_none());
    }

    #[tokio::test]
    async fn timer_task_rolls_rounds_over() {
        let config = Config {
            round_duration: Duration::from_millis(200),
            tick_interval: Duration::from_millis(20),
            ..Config::default()
        };
        let engine = Arc::new(Engine::start(config, Arc::new(MemoryStore::new())).await);
        let mut events = engine.subscribe();

        let handle = tokio::spawn(run_round_timer(Arc::clone(&engine)));
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timer never closed the round")
            .unwrap();
        handle.abort();

        assert!(matches!(
            event,
            crate::events::RoundEvent::RoundClosed { next_round_number: 2, .. }
        ));
    }
}
