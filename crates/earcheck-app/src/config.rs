//! Configuration constants for earcheck app services

/// Application metadata
pub mod app {
    /// Application name (used for the config directory)
    pub const NAME: &str = "earcheck";
}

/// Persisted file names inside the config directory
pub mod files {
    /// In-progress test checkpoint
    pub const PROGRESS_FILE: &str = "progress.json";

    /// User settings
    pub const SETTINGS_FILE: &str = "settings.json";
}

/// Controller loop configuration
pub mod controller {
    /// Longest the controller waits for a command before polling timers and tone events
    pub const POLL_MS: u64 = 20;

    /// Capacity of the command channel
    pub const COMMAND_CAPACITY: usize = 64;
}

/// Bounds on durations read from settings
pub mod limits {
    /// Longest pulse, gap or ramp (ms)
    pub const MAX_TONE_MS: u64 = 5_000;

    /// Longest pacing delay (ms)
    pub const MAX_PACING_MS: u64 = 600_000;
}

/// User-facing messages
pub mod messages {
    pub const PREMATURE_RESPONSE: &str = "Play the tone before answering";
    pub const MAX_LEVEL_WARNING: &str =
        "Maximum level reached. Keep the volume comfortable to protect your hearing.";
    pub const INACTIVITY_NUDGE: &str = "Still there? Press play when you are ready.";
    pub const EXIT_WARNING: &str =
        "Leaving now will discard your assessment progress and personal audiogram data.";
    pub const LEFT_EAR_DONE: &str = "Left ear complete. Halfway done!";
    pub const FINAL_TONE_NEXT: &str = "Right ear almost complete. Final tone next!";
    pub const ASSESSMENT_DONE: &str = "Assessment complete. Generating your audiogram...";
    pub const CALIBRATION_DONE: &str = "Calibration complete. Test conditions standardized";
    pub const RESUMING: &str = "Resuming your assessment...";
}
