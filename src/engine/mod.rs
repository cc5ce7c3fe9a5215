mod guard;

use crate::config::Config;
use crate::db::{StateStore, dedupe_history, repair_state};
use crate::error::EngineError;
use crate::events::{Broadcaster, RoundEvent};
use crate::models::{
    Diagnostics, Direction, HistoryEntry, PersistedState, Status, Tally, VoteLogEntry, VoteSummary,
};
use crate::voting::calculate_change;
use crate::voting::clock::RoundClock;
use crate::voting::ledger::{Rejection, Submission, VoteLedger};
use chrono::{DateTime, Utc};
use guard::ProcessingGuard;
use log::{debug, error, info, warn};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, Notify, RwLock, broadcast};

/// An accepted vote and the round tally right after it.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteReceipt {
    pub tally: Tally,
    pub vote: VoteLogEntry,
}

/// A round that was just committed to the history log.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundClose {
    pub entry: HistoryEntry,
    pub previous_score: f64,
    pub delta: f64,
    pub next_round_number: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    Committed(RoundClose),
    // The round was in the history already; nothing changed
    AlreadyClosed { round_number: u64, score: f64 },
}

impl CloseOutcome {
    pub fn score(&self) -> f64 {
        match self {
            CloseOutcome::Committed(close) => close.entry.score,
            CloseOutcome::AlreadyClosed { score, .. } => *score,
        }
    }

    pub fn vote_summary(&self) -> VoteSummary {
        match self {
            CloseOutcome::Committed(close) => VoteSummary {
                up_votes: close.entry.up_votes,
                down_votes: close.entry.down_votes,
                total_votes: close.entry.total_votes,
            },
            CloseOutcome::AlreadyClosed { .. } => VoteSummary::default(),
        }
    }
}

// Everything the engine owns. Only Engine methods ever touch it.
struct RoundState {
    score: f64,
    history: Vec<HistoryEntry>,
    vote_log: VecDeque<VoteLogEntry>,
    ledger: VoteLedger,
    clock: RoundClock,
}

impl RoundState {
    fn fresh(config: &Config, now: DateTime<Utc>) -> Self {
        Self {
            score: config.rules.initial_score,
            history: vec![HistoryEntry::seed(config.rules.initial_score)],
            vote_log: VecDeque::with_capacity(config.vote_log_capacity),
            ledger: VoteLedger::new(1),
            clock: RoundClock::new(1, now, config.round_duration),
        }
    }

    fn from_persisted(state: PersistedState, config: &Config) -> Self {
        let active_round = state.clock.active_round_number;
        Self {
            score: state.score,
            history: state.history,
            vote_log: state.vote_log.into(),
            // Votes cast before a restart are not kept; the round starts with an empty ledger
            ledger: VoteLedger::new(active_round),
            clock: RoundClock::from_state(state.clock, config.round_duration),
        }
    }

    fn snapshot(&self) -> PersistedState {
        PersistedState {
            history: self.history.clone(),
            vote_log: self.vote_log.iter().cloned().collect(),
            score: self.score,
            clock: self.clock.state(),
        }
    }

    fn closed_entry(&self, round_number: u64) -> Option<&HistoryEntry> {
        self.history
            .binary_search_by_key(&round_number, |entry| entry.round_number)
            .ok()
            .map(|idx| &self.history[idx])
    }

    fn commit_round(&mut self, round_number: u64, config: &Config, now: DateTime<Utc>) -> Result<CloseOutcome, EngineError> {
        // A repeat close reports the score that round committed, not today's score
        if let Some(entry) = self.closed_entry(round_number) {
            return Ok(CloseOutcome::AlreadyClosed {
                round_number,
                score: entry.score,
            });
        }

        let active = self.clock.active_round_number();
        if round_number != active || self.ledger.round_number() != active {
            return Err(EngineError::WrongRound {
                active,
                requested: round_number,
            });
        }

        let tally = self.ledger.tally();
        let change = calculate_change(self.score, &tally, &config.rules);
        let entry = HistoryEntry::new(round_number, change.new_score, tally.up_votes, tally.down_votes);

        self.history.push(entry.clone());
        let previous_score = self.score;
        self.score = change.new_score;

        // Dropping the old ledger frees its voter set
        let next_round_number = round_number + 1;
        self.ledger = VoteLedger::new(next_round_number);
        self.clock.start_round(next_round_number, now);

        Ok(CloseOutcome::Committed(RoundClose {
            entry,
            previous_score,
            delta: change.delta,
            next_round_number,
        }))
    }
}

/// The minute-cycle aggregation engine.
///
/// Single writer for the score, history log and round clock. Round closes
/// are serialized by a processing guard that fails fast instead of queueing.
pub struct Engine {
    config: Config,
    state: RwLock<RoundState>,
    processing: AtomicBool,
    store: Arc<dyn StateStore>,
    save_lock: Mutex<()>,
    save_requested: Notify,
    broadcaster: Broadcaster,
}

impl Engine {
    /// Loads (and repairs) persisted state, or seeds a fresh history when there is none.
    pub async fn start(config: Config, store: Arc<dyn StateStore>) -> Self {
        let now = Utc::now();
        let mut needs_save = false;

        let state = match store.load().await {
            Ok(Some(mut persisted)) => {
                needs_save = repair_state(&mut persisted, &config.rules, config.vote_log_capacity);
                RoundState::from_persisted(persisted, &config)
            }
            Ok(None) => {
                info!("No saved state found, starting from score {}", config.rules.initial_score);
                needs_save = true;
                RoundState::fresh(&config, now)
            }
            Err(e) => {
                error!("Failed to load saved state, starting fresh: {}", e);
                RoundState::fresh(&config, now)
            }
        };

        let engine = Self {
            config,
            state: RwLock::new(state),
            processing: AtomicBool::new(false),
            store,
            save_lock: Mutex::new(()),
            save_requested: Notify::new(),
            broadcaster: Broadcaster::default(),
        };

        if needs_save {
            engine.persist().await;
        }
        engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.broadcaster.subscribe()
    }

    pub async fn active_round_number(&self) -> u64 {
        self.state.read().await.clock.active_round_number()
    }

    /// Full history log, oldest first.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.state.read().await.history.clone()
    }

    pub async fn status(&self) -> Status {
        self.status_at(Utc::now()).await
    }

    pub async fn status_at(&self, now: DateTime<Utc>) -> Status {
        let state = self.state.read().await;
        Status {
            score: state.score,
            active_round_number: state.clock.active_round_number(),
            time_left_seconds: state.clock.time_left_at(now),
            tally: state.ledger.tally(),
            recent_history: state
                .history
                .iter()
                .skip(state.history.len().saturating_sub(self.config.recent_history))
                .cloned()
                .collect(),
            recent_vote_log: state
                .vote_log
                .iter()
                .rev()
                .take(self.config.recent_votes)
                .cloned()
                .collect(),
        }
    }

    /// The active round, if its deadline has passed at `now`.
    pub async fn expired_round(&self, now: DateTime<Utc>) -> Option<u64> {
        let state = self.state.read().await;
        state
            .clock
            .is_expired(now)
            .then(|| state.clock.active_round_number())
    }

    pub async fn submit_vote(
        &self,
        round_number: u64,
        voter_id: &str,
        voter_display_name: &str,
        direction: Direction,
    ) -> Result<VoteReceipt, EngineError> {
        let display_name = voter_display_name.trim();
        if display_name.is_empty() {
            return Err(EngineError::MissingName);
        }

        let receipt = {
            let mut state = self.state.write().await;
            match state.ledger.submit_vote(round_number, voter_id, direction) {
                Submission::Accepted(tally) => {
                    let vote = VoteLogEntry::new(round_number, voter_id.to_string(), display_name.to_string(), direction);
                    state.vote_log.push_back(vote.clone());
                    while state.vote_log.len() > self.config.vote_log_capacity {
                        state.vote_log.pop_front();
                    }
                    VoteReceipt { tally, vote }
                }
                Submission::Rejected { reason: Rejection::AlreadyVoted, tally } => {
                    debug!(
                        "{} already voted in round {} ({} votes so far)",
                        voter_id, round_number, tally.total_votes
                    );
                    return Err(EngineError::AlreadyVoted);
                }
                Submission::Rejected { reason: Rejection::WrongRound { active }, .. } => {
                    return Err(EngineError::WrongRound {
                        active,
                        requested: round_number,
                    });
                }
            }
        };

        info!(
            "{} voted {} in round {} ({} up / {} down)",
            receipt.vote.voter_display_name, direction, round_number, receipt.tally.up_votes, receipt.tally.down_votes
        );
        self.broadcaster.publish(RoundEvent::VoteAccepted {
            tally: receipt.tally,
            vote: receipt.vote.clone(),
        });
        self.request_save();
        Ok(receipt)
    }

    /// Tallies `round_number` into the score exactly once.
    pub async fn close_round(&self, round_number: u64) -> Result<CloseOutcome, EngineError> {
        self.close_round_at(round_number, Utc::now()).await
    }

    pub async fn close_round_at(&self, round_number: u64, now: DateTime<Utc>) -> Result<CloseOutcome, EngineError> {
        let guard = ProcessingGuard::acquire(&self.processing).ok_or_else(|| {
            warn!("Close of round {} skipped, another close is in progress", round_number);
            EngineError::AlreadyProcessing
        })?;

        let outcome = {
            let mut state = self.state.write().await;
            state.commit_round(round_number, &self.config, now)
        };
        drop(guard);

        let outcome = outcome?;
        match &outcome {
            CloseOutcome::Committed(close) => {
                info!(
                    "Closed round {}: {} up / {} down, change {:+.2}, score {} -> {}",
                    close.entry.round_number,
                    close.entry.up_votes,
                    close.entry.down_votes,
                    close.delta,
                    close.previous_score,
                    close.entry.score
                );
                self.request_save();
                self.broadcaster.publish(RoundEvent::RoundClosed {
                    history_entry: close.entry.clone(),
                    new_score: close.entry.score,
                    next_round_number: close.next_round_number,
                });
            }
            CloseOutcome::AlreadyClosed { round_number, .. } => {
                info!("Round {} was already closed, nothing to do", round_number);
            }
        }
        Ok(outcome)
    }

    /// Truncates history to the seed entry and starts over from round 1.
    pub async fn reset(&self) -> Result<(), EngineError> {
        let guard = ProcessingGuard::acquire(&self.processing).ok_or(EngineError::AlreadyProcessing)?;
        {
            let mut state = self.state.write().await;
            *state = RoundState::fresh(&self.config, Utc::now());
        }
        drop(guard);

        info!("State reset to score {}", self.config.rules.initial_score);
        self.request_save();
        self.broadcaster.publish(RoundEvent::StateReset {
            score: self.config.rules.initial_score,
            active_round_number: 1,
        });
        Ok(())
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let state = self.state.read().await;
        let rounds: Vec<u64> = state.history.iter().map(|entry| entry.round_number).collect();
        let unique_rounds = rounds.iter().collect::<HashSet<_>>().len();
        Diagnostics {
            total_entries: rounds.len(),
            unique_rounds,
            has_duplicates: unique_rounds != rounds.len(),
            rounds,
            active_round_number: state.clock.active_round_number(),
            vote_log_len: state.vote_log.len(),
            server_time: Utc::now(),
        }
    }

    /// Runs the duplicate-round sweep on the live history. Returns entries removed.
    pub async fn repair_history(&self) -> usize {
        let removed = {
            let mut state = self.state.write().await;
            dedupe_history(&mut state.history)
        };
        if removed > 0 {
            info!("Cleaned up {} duplicate history entries", removed);
            self.request_save();
        }
        removed
    }

    /// Marks the state dirty. Requests made while a save is pending collapse into one.
    pub fn request_save(&self) {
        self.save_requested.notify_one();
    }

    /// Resolves once a save has been requested since the last call.
    pub async fn save_requested(&self) {
        self.save_requested.notified().await;
    }

    /// Best-effort save of the current state. Failures are logged, never returned.
    pub async fn persist(&self) {
        let _io = self.save_lock.lock().await;
        let snapshot = self.state.read().await.snapshot();
        if let Err(e) = self.store.save(&snapshot).await {
            error!("Failed to save state: {}", e);
        }
    }
}
