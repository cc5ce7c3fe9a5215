use crate::config::ScoreRules;
use crate::error::StoreError;
use crate::models::{HistoryEntry, PersistedState};
use crate::voting::clamp_score;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Durable home for the round history, vote log, score and clock.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// `Ok(None)` means nothing has been saved yet.
    async fn load(&self) -> Result<Option<PersistedState>, StoreError>;
    async fn save(&self, state: &PersistedState) -> Result<(), StoreError>;
}

/// Keeps the whole state as one pretty-printed JSON document.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn ensure_parent_dir(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).await?;
        let state: PersistedState = serde_json::from_str(&contents)?;
        info!(
            "Loaded data from {}: {} history points, {} vote logs, score {}",
            self.path.display(),
            state.history.len(),
            state.vote_log.len(),
            state.score
        );
        Ok(Some(state))
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.ensure_parent_dir().await?;

        let contents = serde_json::to_string_pretty(state)?;

        // Write beside the real file and swap it in, so a crash mid-write keeps the old copy
        let temp_path = self.temp_path();
        fs::write(&temp_path, contents).await?;
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

/// Store that lives only as long as the process. Used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<PersistedState>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    #[cfg(test)]
    pub async fn saved(&self) -> Option<PersistedState> {
        self.state.lock().await.clone()
    }

    #[cfg(test)]
    pub async fn save_count(&self) -> usize {
        *self.saves.lock().await
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        *self.state.lock().await = Some(state.clone());
        let mut saves = self.saves.lock().await;
        *saves += 1;
        debug!("In-memory save #{} at score {}", *saves, state.score);
        Ok(())
    }
}

/// Drops later entries that reuse a round number, keeping the first one seen.
/// Returns how many entries were removed.
pub fn dedupe_history(history: &mut Vec<HistoryEntry>) -> usize {
    let before = history.len();
    let mut seen = HashSet::new();
    history.retain(|entry| {
        if seen.insert(entry.round_number) {
            true
        } else {
            warn!("Removing duplicate history entry for round {}", entry.round_number);
            false
        }
    });
    before - history.len()
}

/// Brings a freshly loaded state back in line with the history invariants
/// before anything else gets to see it. Returns true if anything changed.
pub fn repair_state(state: &mut PersistedState, rules: &ScoreRules, vote_log_capacity: usize) -> bool {
    let mut changed = dedupe_history(&mut state.history) > 0;

    if state.history.windows(2).any(|pair| pair[0].round_number > pair[1].round_number) {
        state.history.sort_by_key(|entry| entry.round_number);
        changed = true;
    }

    if state.history.first().map(|entry| entry.round_number) != Some(0) {
        warn!("History is missing the round 0 seed entry, re-inserting it");
        state.history.insert(0, HistoryEntry::seed(rules.initial_score));
        changed = true;
    }

    if state.vote_log.len() > vote_log_capacity {
        let excess = state.vote_log.len() - vote_log_capacity;
        state.vote_log.drain(..excess);
        changed = true;
    }

    let clamped = if state.score.is_finite() {
        clamp_score(state.score, rules)
    } else {
        rules.initial_score
    };
    if clamped != state.score {
        warn!("Stored score {} is outside the configured bounds, using {}", state.score, clamped);
        state.score = clamped;
        changed = true;
    }

    let last_round = state.history.last().map(|entry| entry.round_number).unwrap_or(0);
    if state.clock.active_round_number <= last_round {
        warn!(
            "Stored active round {} is already closed, moving on to round {}",
            state.clock.active_round_number,
            last_round + 1
        );
        state.clock.active_round_number = last_round + 1;
        changed = true;
    }

    changed
}
