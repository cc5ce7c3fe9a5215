use crate::engine::Engine;
use crate::error::EngineError;
use crate::models::Direction;
use log::{info, warn};

/// Submits a vote and turns the outcome into the message shown to the voter.
pub async fn handle_vote(
    engine: &Engine,
    round_number: u64,
    voter_id: &str,
    voter_display_name: &str,
    direction: Direction,
) -> String {
    match engine.submit_vote(round_number, voter_id, voter_display_name, direction).await {
        Ok(receipt) => format!(
            "Vote recorded! Round {} now has {} up / {} down ({} total). Wait for the next round to vote again.",
            receipt.tally.round_number, receipt.tally.up_votes, receipt.tally.down_votes, receipt.tally.total_votes
        ),
        Err(EngineError::AlreadyVoted) => {
            info!("Voter {} tried to vote twice in round {}", voter_id, round_number);
            "Already voted this round. Wait for the next round to vote again.".to_string()
        }
        Err(EngineError::WrongRound { active, .. }) => {
            format!("Round {} is no longer open, voting is now on round {}.", round_number, active)
        }
        Err(EngineError::MissingName) => "Please enter your name before voting.".to_string(),
        Err(e) => {
            warn!("Unexpected vote rejection for {}: {}", voter_id, e);
            format!("Vote not recorded: {}", e)
        }
    }
}
