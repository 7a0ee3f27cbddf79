//! Configuration constants for the earcheck engine

/// Tone synthesis configuration
pub mod audio {
    /// Output sample rate in Hz
    pub const SAMPLE_RATE: u32 = 44_100;

    /// Output channel count (hard-panned stereo)
    pub const CHANNELS: u16 = 2;

    /// Pulses per stimulus presentation
    pub const PULSE_COUNT: u8 = 3;

    /// Duration of each pulse in milliseconds
    pub const PULSE_MS: u64 = 300;

    /// Silence between pulses in milliseconds
    pub const GAP_MS: u64 = 200;

    /// Linear rise/fall time applied to every pulse edge in milliseconds
    pub const RAMP_MS: u64 = 25;

    /// Fade time for level changes on the continuous calibration tone
    pub const STEADY_SLEW_MS: u64 = 50;

    /// Engine thread idle poll interval in milliseconds
    pub const ENGINE_POLL_MS: u64 = 500;
}

/// Level mapping configuration
pub mod level {
    /// Offset added to a dB level before conversion to linear gain.
    /// 80 dB maps to full scale; 0 dB maps to -80 dBFS.
    pub const GAIN_OFFSET_DB: f32 = -80.0;
}

/// Adaptive staircase defaults
pub mod staircase {
    /// Starting level for every stimulus (dB)
    pub const START_DB: i32 = 35;

    /// Step applied after a "heard" response while descending (dB)
    pub const STEP_DOWN_DB: i32 = 10;

    /// Step applied after a "not heard" response (dB)
    pub const STEP_UP_DB: i32 = 5;

    /// Lowest presentable level (dB)
    pub const FLOOR_DB: i32 = -10;

    /// Highest presentable level (dB)
    pub const CEILING_DB: i32 = 80;

    /// Hard cap on non-catch presentations per stimulus
    pub const MAX_PRESENTATIONS: u32 = 10;

    /// Levels and steps accepted from settings stay within ±this (dB)
    pub const LEVEL_LIMIT_DB: i32 = 200;
}

/// Calibration flow configuration
pub mod calibration {
    /// Reference tone frequency in Hz
    pub const REFERENCE_FREQUENCY_HZ: u32 = 1000;

    /// Lowest calibration level (dB)
    pub const MIN_DB: i32 = 20;

    /// Highest calibration level (dB); reaching it raises the safety warning
    pub const MAX_DB: i32 = 70;

    /// Level each ear starts at (dB)
    pub const INITIAL_DB: i32 = 40;

    /// Raise/lower step (dB)
    pub const STEP_DB: i32 = 5;
}

/// Stimulus sequence configuration
pub mod stimuli {
    /// Test frequencies in Hz, ascending
    pub const FREQUENCIES_HZ: [u32; 5] = [500, 1000, 2000, 4000, 8000];

    /// Silent catch trials injected per ear
    pub const CATCH_TRIALS_PER_EAR: usize = 1;
}

/// Session pacing
pub mod timing {
    /// Countdown ticks before the first presentation of a stimulus
    pub const COUNTDOWN_TICKS: u8 = 3;

    /// Duration of one countdown tick in milliseconds
    pub const COUNTDOWN_TICK_MS: u64 = 400;

    /// Pause after each response before the next step in milliseconds
    pub const TRANSITION_MS: u64 = 600;

    /// "Preparing" pause between calibration and testing in milliseconds
    pub const PREPARING_MS: u64 = 2000;

    /// "Processing" pause before results are shown in milliseconds
    pub const PROCESSING_MS: u64 = 2000;

    /// How long inline warnings stay visible in milliseconds
    pub const WARNING_DISPLAY_MS: u64 = 2000;

    /// How long milestone messages stay visible in milliseconds
    pub const MILESTONE_DISPLAY_MS: u64 = 3000;

    /// Idle time before the inactivity nudge appears in seconds
    pub const INACTIVITY_NUDGE_SECS: u64 = 12;

    /// Average time a single stimulus takes, for remaining-time estimates
    pub const AVG_SECS_PER_TONE: u64 = 6;
}

/// Scoring configuration
pub mod scoring {
    /// Frequencies averaged into the pure-tone average
    pub const PTA_FREQUENCIES_HZ: [u32; 3] = [500, 1000, 2000];

    /// Frequencies averaged into the high-frequency PTA
    pub const HIGH_FREQUENCIES_HZ: [u32; 2] = [4000, 8000];

    /// Low-frequency reference band used for slope detection
    pub const LOW_FREQUENCIES_HZ: [u32; 2] = [500, 1000];

    /// Upper limit of normal hearing (dB)
    pub const NORMAL_LIMIT_DB: i32 = 25;

    /// Low/high band difference that counts as a sloping pattern (dB)
    pub const SLOPE_DELTA_DB: i32 = 15;

    /// Ear difference that counts as asymmetric (dB)
    pub const ASYMMETRY_DELTA_DB: i32 = 15;

    /// Largest ear difference still compatible with "bilateral normal" (dB)
    pub const SYMMETRY_TOLERANCE_DB: i32 = 10;

    /// Rise of 4 kHz above both neighbours that counts as a notch (dB)
    pub const NOTCH_DELTA_DB: i32 = 10;

    /// Highest false-positive rate still considered reliable
    pub const MAX_RELIABLE_FALSE_POSITIVE_RATE: f64 = 0.5;
}

/// Report text configuration
pub mod report {
    /// Product named in the recommendation
    pub const PRODUCT_NAME: &str = "Nova";
}
