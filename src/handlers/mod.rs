mod vote;

pub use vote::handle_vote;

use crate::engine::{CloseOutcome, Engine};
use crate::error::EngineError;
use log::error;

pub async fn handle_status(engine: &Engine) -> String {
    let status = engine.status().await;
    let mut lines = vec![format!(
        "Productivity {:.1}% | round {} | {}s left | {} up / {} down",
        status.score,
        status.active_round_number,
        status.time_left_seconds,
        status.tally.up_votes,
        status.tally.down_votes
    )];

    // Last few points of the chart, oldest first
    let skip = status.recent_history.len().saturating_sub(5);
    for entry in status.recent_history.iter().skip(skip) {
        lines.push(format!(
            "  {:>6}  {:>5.1}%  ({} up / {} down)",
            entry.label, entry.score, entry.up_votes, entry.down_votes
        ));
    }

    if !status.recent_vote_log.is_empty() {
        lines.push("Recent votes:".to_string());
        for vote in &status.recent_vote_log {
            lines.push(format!(
                "  {} {} voted {} in round {}",
                vote.submitted_at.format("%H:%M:%S"),
                vote.voter_display_name,
                vote.direction,
                vote.round_number
            ));
        }
    }

    lines.join("\n")
}

/// Manually closes the active round, the same way the timer would.
pub async fn handle_close(engine: &Engine) -> String {
    let round_number = engine.active_round_number().await;
    match engine.close_round(round_number).await {
        Ok(outcome) => match &outcome {
            CloseOutcome::Committed(close) => {
                let votes = outcome.vote_summary();
                format!(
                    "Round {} closed: {} up / {} down, productivity {:.1}% -> {:.1}% ({:+.2})",
                    close.entry.round_number,
                    votes.up_votes,
                    votes.down_votes,
                    close.previous_score,
                    outcome.score(),
                    close.delta
                )
            }
            CloseOutcome::AlreadyClosed { round_number, .. } => format!(
                "Round {} was already closed at {:.1}%",
                round_number,
                outcome.score()
            ),
        },
        Err(EngineError::AlreadyProcessing) => "Votes are already being processed, try again shortly.".to_string(),
        Err(e) => format!("Could not close round {}: {}", round_number, e),
    }
}

/// The whole chart, one line per closed round.
pub async fn handle_history(engine: &Engine) -> String {
    let history = engine.history().await;
    let mut lines = vec![format!("{} history points", history.len())];
    for entry in &history {
        lines.push(format!(
            "  {:>4}  {:>6}  {:>5.1}%  ({} up / {} down)",
            entry.round_number, entry.label, entry.score, entry.up_votes, entry.down_votes
        ));
    }
    lines.join("\n")
}

pub async fn handle_reset(engine: &Engine) -> String {
    match engine.reset().await {
        Ok(()) => "System reset successfully".to_string(),
        Err(e) => format!("Reset refused: {}", e),
    }
}

pub async fn handle_debug(engine: &Engine) -> String {
    let diagnostics = engine.diagnostics().await;
    match serde_json::to_string_pretty(&diagnostics) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to encode diagnostics: {}", e);
            "Diagnostics unavailable".to_string()
        }
    }
}

pub async fn handle_repair(engine: &Engine) -> String {
    match engine.repair_history().await {
        0 => "History is clean, nothing to repair".to_string(),
        removed => format!("Cleanup completed, removed {} duplicate entries", removed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::MemoryStore;
    use crate::models::Direction;
    use std::sync::Arc;

    async fn engine() -> Engine {
        Engine::start(Config::default(), Arc::new(MemoryStore::new())).await
    }

    #[tokio::test]
    async fn close_reports_the_score_change() {
        let engine = engine().await;
        handle_vote(&engine, 1, "u1", "Ada", Direction::Up).await;

        let message = handle_close(&engine).await;
        assert_eq!(
            message,
            "Round 1 closed: 1 up / 0 down, productivity 75.0% -> 80.0% (+5.00)"
        );
        assert!(handle_status(&engine).await.starts_with("Productivity 80.0% | round 2"));
    }

    #[tokio::test]
    async fn status_lists_recent_votes() {
        let engine = engine().await;
        handle_vote(&engine, 1, "u1", "Ada", Direction::Down).await;
        let status = handle_status(&engine).await;
        assert!(status.contains("Ada voted down in round 1"));
        assert!(status.contains("0:00"));
    }

    #[tokio::test]
    async fn history_lists_every_round_and_reclose_keeps_its_score() {
        let engine = engine().await;
        handle_vote(&engine, 1, "u1", "Ada", Direction::Up).await;
        handle_close(&engine).await;
        handle_close(&engine).await;

        let history = handle_history(&engine).await;
        assert!(history.starts_with("3 history points"));
        assert!(history.contains("80.0%  (1 up / 0 down)"));

        assert_eq!(
            engine.close_round(1).await.map(|outcome| outcome.score()),
            Ok(80.0)
        );
    }

    #[tokio::test]
    async fn debug_and_repair() {
        let engine = engine().await;
        let debug = handle_debug(&engine).await;
        assert!(debug.contains("\"hasDuplicates\": false"));
        assert_eq!(handle_repair(&engine).await, "History is clean, nothing to repair");
        assert_eq!(handle_reset(&engine).await, "System reset successfully");
    }
}
