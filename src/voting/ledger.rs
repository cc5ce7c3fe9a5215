use crate::models::{Direction, Tally};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    WrongRound { active: u64 },
    AlreadyVoted,
}

/// What happened to a vote handed to the ledger. Rejection is a normal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted(Tally),
    Rejected { reason: Rejection, tally: Tally },
}

/// Mutable tally for the round currently accepting votes.
#[derive(Debug, Clone)]
pub struct VoteLedger {
    round_number: u64,
    up_votes: u32,
    down_votes: u32,
    voter_ids: HashSet<String>,
}

impl VoteLedger {
    pub fn new(round_number: u64) -> Self {
        Self {
            round_number,
            up_votes: 0,
            down_votes: 0,
            voter_ids: HashSet::new(),
        }
    }

    pub fn round_number(&self) -> u64 {
        self.round_number
    }

    pub fn tally(&self) -> Tally {
        Tally {
            round_number: self.round_number,
            up_votes: self.up_votes,
            down_votes: self.down_votes,
            total_votes: self.up_votes + self.down_votes,
        }
    }

    pub fn submit_vote(&mut self, round_number: u64, voter_id: &str, direction: Direction) -> Submission {
        if round_number != self.round_number {
            return Submission::Rejected {
                reason: Rejection::WrongRound { active: self.round_number },
                tally: self.tally(),
            };
        }

        // One vote per voter per round
        if !self.voter_ids.insert(voter_id.to_string()) {
            return Submission::Rejected {
                reason: Rejection::AlreadyVoted,
                tally: self.tally(),
            };
        }

        match direction {
            Direction::Up => self.up_votes += 1,
            Direction::Down => self.down_votes += 1,
        }

        Submission::Accepted(self.tally())
    }
}
