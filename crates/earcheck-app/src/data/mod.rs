//! Data persistence
//!
//! Session checkpoints and settings, stored as JSON in the config directory.

pub mod progress;
pub mod settings;
pub mod storage;

pub use progress::{unix_timestamp, ProgressStore, SavedProgress};
pub use settings::{PacingSettings, Settings, ToneSettings};
pub use storage::{config_dir, data_path, load, save};
