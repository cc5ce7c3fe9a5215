pub mod autosave;
pub mod event_logger;
pub mod persister;
pub mod round_timer;
