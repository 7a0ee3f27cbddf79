//! Session progress store
//!
//! One checkpoint record, written after each resolved stimulus and removed
//! when the test reaches processing. The store only serializes engine data;
//! it never interprets it.
//!
//! A record that cannot be read or parsed counts as no record.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use earcheck::procedure::{
    CalibrationBaseline, CatchPlan, CatchTrialRecord, StaircaseParams, StimulusSequence,
    ThresholdEngine, ThresholdResult,
};

use crate::config::files::PROGRESS_FILE;
use crate::data::storage;
use crate::error::Result;

/// Phase name stored with every checkpoint
pub const TESTING_PHASE: &str = "testing";

/// Current unix time in seconds
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Checkpoint at a stimulus boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProgress {
    /// Index of the next stimulus to measure
    pub progress_index: usize,
    pub thresholds: Vec<ThresholdResult>,
    pub calibration_baseline: CalibrationBaseline,
    pub catch_trial_record: CatchTrialRecord,
    /// Catch-trial indices chosen at session start
    #[serde(default)]
    pub catch_plan: CatchPlan,
    pub phase: String,
    /// Unix seconds
    pub timestamp: u64,
}

impl SavedProgress {
    /// Capture the engine at its current boundary
    pub fn capture(
        engine: &ThresholdEngine,
        calibration_baseline: CalibrationBaseline,
        timestamp: u64,
    ) -> Self {
        Self {
            progress_index: engine.index(),
            thresholds: engine.results().to_vec(),
            calibration_baseline,
            catch_trial_record: engine.catch_trials(),
            catch_plan: engine.catch_plan().clone(),
            phase: TESTING_PHASE.to_string(),
            timestamp,
        }
    }

    /// Started but not finished
    pub fn is_resumable(&self, total_stimuli: usize) -> bool {
        self.progress_index > 0 && self.progress_index < total_stimuli
    }

    /// Rebuild an engine at the saved boundary
    pub fn restore(
        &self,
        params: StaircaseParams,
        sequence: StimulusSequence,
    ) -> Result<ThresholdEngine> {
        let engine = ThresholdEngine::resume(
            params,
            sequence,
            self.catch_plan.clone(),
            self.thresholds.clone(),
            self.catch_trial_record,
        )?;
        Ok(engine)
    }
}

/// File-backed checkpoint store
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    /// Store at an explicit path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the application config directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(storage::data_path(PROGRESS_FILE)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, progress: &SavedProgress) -> Result<()> {
        storage::save_to(&self.path, progress)?;
        debug!(
            "Checkpoint saved at stimulus {} ({} results)",
            progress.progress_index,
            progress.thresholds.len()
        );
        Ok(())
    }

    /// Saved record, if one exists and parses
    pub fn load(&self) -> Option<SavedProgress> {
        match storage::load_from::<SavedProgress>(&self.path) {
            Ok(progress) => progress,
            Err(e) => {
                warn!("Ignoring saved progress: {}", e);
                None
            }
        }
    }

    /// Saved record worth offering for resume
    pub fn load_resumable(&self, total_stimuli: usize) -> Option<SavedProgress> {
        self.load().filter(|p| p.is_resumable(total_stimuli))
    }

    pub fn clear(&self) -> Result<()> {
        storage::delete_at(&self.path)
    }
}
