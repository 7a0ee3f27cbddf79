//! Application settings
//!
//! Runtime overrides for the test procedure. Every field has a default, so a
//! partial or older file still loads.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use earcheck::audio::{LevelMapper, ToneTiming};
use earcheck::config::{audio, level, stimuli, timing};
use earcheck::procedure::{StaircaseParams, StimulusSequence};

use crate::config::files::SETTINGS_FILE;
use crate::config::limits::{MAX_PACING_MS, MAX_TONE_MS};
use crate::data::storage;
use crate::error::{AppError, Result};

/// Settings file format version for migrations
const SETTINGS_VERSION: u32 = 1;

/// Pulse-train shape in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneSettings {
    pub pulses: u8,
    pub pulse_ms: u64,
    pub gap_ms: u64,
    pub ramp_ms: u64,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            pulses: audio::PULSE_COUNT,
            pulse_ms: audio::PULSE_MS,
            gap_ms: audio::GAP_MS,
            ramp_ms: audio::RAMP_MS,
        }
    }
}

impl ToneSettings {
    pub fn timing(&self) -> ToneTiming {
        ToneTiming {
            pulses: self.pulses,
            pulse: Duration::from_millis(self.pulse_ms),
            gap: Duration::from_millis(self.gap_ms),
            ramp: Duration::from_millis(self.ramp_ms),
        }
    }
}

/// Session pacing in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    pub countdown_ticks: u8,
    pub countdown_tick_ms: u64,
    pub transition_ms: u64,
    pub preparing_ms: u64,
    pub processing_ms: u64,
    pub warning_ms: u64,
    pub milestone_ms: u64,
    pub inactivity_nudge_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            countdown_ticks: timing::COUNTDOWN_TICKS,
            countdown_tick_ms: timing::COUNTDOWN_TICK_MS,
            transition_ms: timing::TRANSITION_MS,
            preparing_ms: timing::PREPARING_MS,
            processing_ms: timing::PROCESSING_MS,
            warning_ms: timing::WARNING_DISPLAY_MS,
            milestone_ms: timing::MILESTONE_DISPLAY_MS,
            inactivity_nudge_ms: timing::INACTIVITY_NUDGE_SECS * 1000,
        }
    }
}

impl PacingSettings {
    fn delays_ms(&self) -> [u64; 7] {
        [
            self.countdown_tick_ms,
            self.transition_ms,
            self.preparing_ms,
            self.processing_ms,
            self.warning_ms,
            self.milestone_ms,
            self.inactivity_nudge_ms,
        ]
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn preparing(&self) -> Duration {
        Duration::from_millis(self.preparing_ms)
    }

    pub fn processing(&self) -> Duration {
        Duration::from_millis(self.processing_ms)
    }

    pub fn warning(&self) -> Duration {
        Duration::from_millis(self.warning_ms)
    }

    pub fn milestone(&self) -> Duration {
        Duration::from_millis(self.milestone_ms)
    }

    pub fn inactivity_nudge(&self) -> Duration {
        Duration::from_millis(self.inactivity_nudge_ms)
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// File format version
    #[serde(default = "default_version")]
    pub version: u32,

    // === Procedure ===
    #[serde(default)]
    pub staircase: StaircaseParams,

    /// Test frequencies in Hz; sorted and de-duplicated when used
    #[serde(default = "default_frequencies")]
    pub frequencies_hz: Vec<u32>,

    /// Silent catch trials per ear
    #[serde(default = "default_catch_trials")]
    pub catch_trials_per_ear: usize,

    // === Audio ===
    /// dB offset of the level-to-gain mapping
    #[serde(default = "default_offset")]
    pub level_offset_db: f32,

    #[serde(default)]
    pub tone: ToneSettings,

    // === Pacing ===
    #[serde(default)]
    pub pacing: PacingSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_frequencies() -> Vec<u32> {
    stimuli::FREQUENCIES_HZ.to_vec()
}

fn default_catch_trials() -> usize {
    stimuli::CATCH_TRIALS_PER_EAR
}

fn default_offset() -> f32 {
    level::GAIN_OFFSET_DB
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            staircase: StaircaseParams::default(),
            frequencies_hz: default_frequencies(),
            catch_trials_per_ear: default_catch_trials(),
            level_offset_db: default_offset(),
            tone: ToneSettings::default(),
            pacing: PacingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from default storage location
    pub fn load() -> Result<Self> {
        Ok(storage::load::<Settings>(SETTINGS_FILE)?.unwrap_or_default())
    }

    /// Load settings from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(storage::load_from::<Settings>(path)?.unwrap_or_default())
    }

    /// Save settings to default storage location
    pub fn save(&self) -> Result<()> {
        storage::save(SETTINGS_FILE, self)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        storage::save_to(path, self)
    }

    /// Reject settings the procedure cannot run with
    pub fn validate(&self) -> Result<()> {
        self.staircase.validate()?;
        if self.sequence().is_empty() {
            return Err(AppError::Config("no test frequencies configured".to_string()));
        }
        if self.tone.pulses == 0 || self.tone.pulse_ms == 0 {
            return Err(AppError::Config(
                "tone must have at least one non-empty pulse".to_string(),
            ));
        }
        let tone = &self.tone;
        if [tone.pulse_ms, tone.gap_ms, tone.ramp_ms]
            .iter()
            .any(|&ms| ms > MAX_TONE_MS)
        {
            return Err(AppError::Config(format!(
                "pulse, gap and ramp must be at most {} ms",
                MAX_TONE_MS
            )));
        }
        if self.pacing.delays_ms().iter().any(|&ms| ms > MAX_PACING_MS) {
            return Err(AppError::Config(format!(
                "pacing delays must be at most {} ms",
                MAX_PACING_MS
            )));
        }
        if !self.level_offset_db.is_finite() {
            return Err(AppError::Config("level offset must be finite".to_string()));
        }
        Ok(())
    }

    pub fn sequence(&self) -> StimulusSequence {
        StimulusSequence::from_frequencies(&self.frequencies_hz)
    }

    pub fn level_mapper(&self) -> LevelMapper {
        LevelMapper::new(self.level_offset_db)
    }

    pub fn tone_timing(&self) -> ToneTiming {
        self.tone.timing()
    }
}
