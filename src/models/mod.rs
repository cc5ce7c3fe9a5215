use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record of one closed round. Never mutated once it is in the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub round_number: u64,
    pub label: String,
    pub score: f64,
    pub up_votes: u32,
    pub down_votes: u32,
    pub total_votes: u32,
}

impl HistoryEntry {
    pub fn new(round_number: u64, score: f64, up_votes: u32, down_votes: u32) -> Self {
        Self {
            round_number,
            label: round_label(round_number),
            score,
            up_votes,
            down_votes,
            total_votes: up_votes + down_votes,
        }
    }

    // Round 0 stands for the starting score before anyone voted
    pub fn seed(score: f64) -> Self {
        Self::new(0, score, 0, 0)
    }
}

pub fn round_label(round_number: u64) -> String {
    format!("{}:00", round_number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "+" => Ok(Direction::Up),
            "down" | "-" => Ok(Direction::Down),
            other => Err(format!("Unknown vote direction: {}", other)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// One accepted vote, kept only for display in the recent-votes feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteLogEntry {
    pub id: String,
    pub voter_display_name: String,
    pub direction: Direction,
    pub submitted_at: DateTime<Utc>,
    pub round_number: u64,
    pub voter_id: String,
}

impl VoteLogEntry {
    pub fn new(round_number: u64, voter_id: String, voter_display_name: String, direction: Direction) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            voter_display_name,
            direction,
            submitted_at: Utc::now(),
            round_number,
            voter_id,
        }
    }
}

/// Up/down counts for a single round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub round_number: u64,
    pub up_votes: u32,
    pub down_votes: u32,
    pub total_votes: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub up_votes: u32,
    pub down_votes: u32,
    pub total_votes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundClockState {
    pub active_round_number: u64,
    pub round_started_at: DateTime<Utc>,
}

/// Everything the durable store keeps between restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub history: Vec<HistoryEntry>,
    pub vote_log: Vec<VoteLogEntry>,
    pub score: f64,
    pub clock: RoundClockState,
}

/// Snapshot handed to observers that (re)connect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub score: f64,
    pub active_round_number: u64,
    pub time_left_seconds: u64,
    pub tally: Tally,
    pub recent_history: Vec<HistoryEntry>,
    pub recent_vote_log: Vec<VoteLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub total_entries: usize,
    pub unique_rounds: usize,
    pub has_duplicates: bool,
    pub rounds: Vec<u64>,
    pub active_round_number: u64,
    pub vote_log_len: usize,
    pub server_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_entry_totals_and_label() {
        let entry = HistoryEntry::new(1, 77.5, 3, 1);
        assert_eq!(entry.total_votes, 4);
        assert_eq!(entry.label, "1:00");
        assert_eq!(HistoryEntry::seed(75.0).label, "0:00");
    }

    #[test]
    fn direction_parses_loosely() {
        assert_eq!("UP".parse::<Direction>(), Ok(Direction::Up));
        assert_eq!("-".parse::<Direction>(), Ok(Direction::Down));
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn persisted_state_uses_camel_case() {
        let state = PersistedState {
            history: vec![HistoryEntry::seed(75.0)],
            vote_log: Vec::new(),
            score: 75.0,
            clock: RoundClockState {
                active_round_number: 1,
                round_started_at: Utc::now(),
            },
        };
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("voteLog").is_some());
        assert_eq!(json["clock"]["activeRoundNumber"], 1);
        assert_eq!(json["history"][0]["roundNumber"], 0);
    }
}
