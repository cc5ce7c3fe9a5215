use crate::models::RoundClockState;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Wall-clock deadline of the active round.
#[derive(Debug, Clone)]
pub struct RoundClock {
    active_round_number: u64,
    round_started_at: DateTime<Utc>,
    round_duration: Duration,
}

impl RoundClock {
    pub fn new(active_round_number: u64, round_started_at: DateTime<Utc>, round_duration: Duration) -> Self {
        Self {
            active_round_number,
            round_started_at,
            round_duration,
        }
    }

    pub fn from_state(state: RoundClockState, round_duration: Duration) -> Self {
        Self::new(state.active_round_number, state.round_started_at, round_duration)
    }

    pub fn state(&self) -> RoundClockState {
        RoundClockState {
            active_round_number: self.active_round_number,
            round_started_at: self.round_started_at,
        }
    }

    pub fn active_round_number(&self) -> u64 {
        self.active_round_number
    }

    // Only the engine restarts the clock, right after it swaps in a fresh ledger
    pub(crate) fn start_round(&mut self, round_number: u64, now: DateTime<Utc>) {
        self.active_round_number = round_number;
        self.round_started_at = now;
    }

    pub fn time_left_ms(&self, now: DateTime<Utc>) -> u64 {
        let elapsed_ms = (now - self.round_started_at).num_milliseconds().max(0) as u64;
        (self.round_duration.as_millis() as u64).saturating_sub(elapsed_ms)
    }

    /// Remaining whole seconds, rounded up so a round only reads 0 once it is over.
    pub fn time_left_at(&self, now: DateTime<Utc>) -> u64 {
        self.time_left_ms(now).div_ceil(1000)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.time_left_ms(now) == 0
    }
}
