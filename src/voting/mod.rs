pub mod clock;
pub mod ledger;

use crate::config::ScoreRules;
use crate::models::Tally;

// Result of applying one round's votes to the score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreChange {
    pub vote_ratio: f64,
    pub delta: f64,
    pub new_score: f64,
}

/// Ratio of net votes to total votes, in [-1, 1]. Zero when nobody voted.
pub fn vote_ratio(tally: &Tally) -> f64 {
    if tally.total_votes == 0 {
        return 0.0;
    }
    (tally.up_votes as f64 - tally.down_votes as f64) / tally.total_votes as f64
}

pub fn clamp_score(score: f64, rules: &ScoreRules) -> f64 {
    score.max(rules.lower_bound).min(rules.upper_bound)
}

pub fn calculate_change(current_score: f64, tally: &Tally, rules: &ScoreRules) -> ScoreChange {
    let vote_ratio = vote_ratio(tally);
    let delta = vote_ratio * rules.step_size;

    ScoreChange {
        vote_ratio,
        delta,
        new_score: clamp_score(current_score + delta, rules),
    }
}
