use crate::engine::Engine;
use crate::events::RoundEvent;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Subscriber that writes every published event to the log.
pub async fn run_event_logger(engine: Arc<Engine>) {
    let mut events = engine.subscribe();

    loop {
        match events.recv().await {
            Ok(RoundEvent::VoteAccepted { tally, vote }) => info!(
                "[event] vote from {} in round {}: {} up / {} down",
                vote.voter_display_name, tally.round_number, tally.up_votes, tally.down_votes
            ),
            Ok(RoundEvent::RoundClosed {
                history_entry,
                new_score,
                next_round_number,
            }) => info!(
                "[event] round {} closed at {:.1}, round {} open",
                history_entry.round_number, new_score, next_round_number
            ),
            Ok(RoundEvent::StateReset { score, .. }) => info!("[event] state reset to {:.1}", score),
            Err(RecvError::Lagged(missed)) => {
                let status = engine.status().await;
                warn!(
                    "[event] missed {} events, resynced at round {} score {:.1}",
                    missed, status.active_round_number, status.score
                );
            }
            Err(RecvError::Closed) => break,
        }
    }
}
