use thiserror::Error;

/// Rejections the engine reports back to callers. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Another round close is already in progress")]
    AlreadyProcessing,
    #[error("Already voted this round")]
    AlreadyVoted,
    #[error("Round {requested} is not open for this action (active round is {active})")]
    WrongRound { active: u64, requested: u64 },
    #[error("Name is required")]
    MissingName,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored state could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
    #[error("Score bounds are inconsistent: lower {lower}, upper {upper}, initial {initial}")]
    Bounds { lower: f64, upper: f64, initial: f64 },
}
