use crate::models::{HistoryEntry, Tally, VoteLogEntry};
use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RoundEvent {
    #[serde(rename_all = "camelCase")]
    VoteAccepted { tally: Tally, vote: VoteLogEntry },
    #[serde(rename_all = "camelCase")]
    RoundClosed {
        history_entry: HistoryEntry,
        new_score: f64,
        next_round_number: u64,
    },
    #[serde(rename_all = "camelCase")]
    StateReset { score: f64, active_round_number: u64 },
}

/// Fans events out to every current subscriber.
///
/// Delivery is best effort. A subscriber that falls more than the channel
/// capacity behind sees `RecvError::Lagged` and should re-fetch the status.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<RoundEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: RoundEvent) {
        // Err only means nobody is listening right now
        match self.sender.send(event) {
            Ok(receivers) => debug!("Published event to {} subscriber(s)", receivers),
            Err(_) => debug!("Published event with no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.sender.subscribe()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
