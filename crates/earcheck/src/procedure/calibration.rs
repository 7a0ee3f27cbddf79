//! Calibration flow
//!
//! Per-ear manual level setting before measurement: `Setup -> LeftEar ->
//! RightEar -> Complete`. A continuous reference tone plays while the user
//! raises or lowers its level; confirming an ear records that level as its
//! baseline.
//!
//! The baseline only annotates the report. Staircase levels are never
//! offset by it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audio::Ear;
use crate::config::calibration::{INITIAL_DB, MAX_DB, MIN_DB, REFERENCE_FREQUENCY_HZ, STEP_DB};
use crate::error::{Result, TestError};

/// Calibration progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationStep {
    #[default]
    Setup,
    LeftEar,
    RightEar,
    Complete,
}

impl CalibrationStep {
    /// Ear being calibrated in this step
    pub fn ear(self) -> Option<Ear> {
        match self {
            CalibrationStep::LeftEar => Some(Ear::Left),
            CalibrationStep::RightEar => Some(Ear::Right),
            _ => None,
        }
    }
}

impl fmt::Display for CalibrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationStep::Setup => write!(f, "setup"),
            CalibrationStep::LeftEar => write!(f, "calibrating left ear"),
            CalibrationStep::RightEar => write!(f, "calibrating right ear"),
            CalibrationStep::Complete => write!(f, "calibration complete"),
        }
    }
}

/// Per-ear calibration levels. Written once per ear, read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationBaseline {
    pub left: Option<i32>,
    pub right: Option<i32>,
}

impl CalibrationBaseline {
    pub fn get(&self, ear: Ear) -> Option<i32> {
        match ear {
            Ear::Left => self.left,
            Ear::Right => self.right,
        }
    }

    /// Both ears recorded
    pub fn is_complete(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }
}

/// What the tone output should do after a calibration operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneAction {
    None,
    Start {
        frequency_hz: u32,
        ear: Ear,
        level_db: i32,
    },
    SetLevel(i32),
    Stop,
}

/// Result of raising or lowering the level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub level_db: i32,
    /// Level reached the maximum; show the safety warning
    pub max_warning: bool,
    /// Level moved down; any safety warning no longer applies
    pub clear_warning: bool,
    pub tone: ToneAction,
}

/// Calibration state machine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CalibrationFlow {
    step: CalibrationStep,
    level_db: i32,
    baseline: CalibrationBaseline,
    tone_playing: bool,
}

impl CalibrationFlow {
    pub fn new() -> Self {
        Self {
            step: CalibrationStep::Setup,
            level_db: INITIAL_DB,
            baseline: CalibrationBaseline::default(),
            tone_playing: false,
        }
    }

    pub fn step(&self) -> CalibrationStep {
        self.step
    }

    pub fn level_db(&self) -> i32 {
        self.level_db
    }

    pub fn baseline(&self) -> CalibrationBaseline {
        self.baseline
    }

    pub fn is_tone_playing(&self) -> bool {
        self.tone_playing
    }

    pub fn is_complete(&self) -> bool {
        self.step == CalibrationStep::Complete
    }

    /// Ear being calibrated, if any
    pub fn current_ear(&self) -> Option<Ear> {
        self.step.ear()
    }

    /// Leave setup and start the left-ear reference tone
    pub fn begin(&mut self) -> Result<ToneAction> {
        if self.step != CalibrationStep::Setup {
            return Err(TestError::invalid_phase("begin calibration", self.step));
        }
        self.step = CalibrationStep::LeftEar;
        self.level_db = INITIAL_DB;
        Ok(self.start_tone(Ear::Left))
    }

    /// Start or stop the reference tone for the current ear
    pub fn toggle_tone(&mut self) -> Result<ToneAction> {
        let ear = self.require_ear("toggle the tone")?;
        if self.tone_playing {
            self.tone_playing = false;
            Ok(ToneAction::Stop)
        } else {
            Ok(self.start_tone(ear))
        }
    }

    /// One step louder, up to the maximum
    pub fn raise(&mut self) -> Result<LevelChange> {
        self.require_ear("raise the level")?;
        self.level_db = (self.level_db + STEP_DB).min(MAX_DB);
        Ok(self.level_change(self.level_db == MAX_DB, false))
    }

    /// One step quieter, down to the minimum
    pub fn lower(&mut self) -> Result<LevelChange> {
        self.require_ear("lower the level")?;
        self.level_db = (self.level_db - STEP_DB).max(MIN_DB);
        Ok(self.level_change(false, true))
    }

    /// Record the current level for this ear, stop the tone and advance
    pub fn confirm(&mut self) -> Result<ToneAction> {
        let ear = self.require_ear("confirm the level")?;
        match ear {
            Ear::Left => {
                self.baseline.left = Some(self.level_db);
                self.step = CalibrationStep::RightEar;
                self.level_db = INITIAL_DB;
            }
            Ear::Right => {
                self.baseline.right = Some(self.level_db);
                self.step = CalibrationStep::Complete;
            }
        }
        Ok(self.stop_tone())
    }

    /// Silence the tone without changing step (leaving calibration)
    pub fn stop_tone(&mut self) -> ToneAction {
        if self.tone_playing {
            self.tone_playing = false;
            ToneAction::Stop
        } else {
            ToneAction::None
        }
    }

    fn start_tone(&mut self, ear: Ear) -> ToneAction {
        self.tone_playing = true;
        ToneAction::Start {
            frequency_hz: REFERENCE_FREQUENCY_HZ,
            ear,
            level_db: self.level_db,
        }
    }

    fn level_change(&self, max_warning: bool, clear_warning: bool) -> LevelChange {
        LevelChange {
            level_db: self.level_db,
            max_warning,
            clear_warning,
            tone: if self.tone_playing {
                ToneAction::SetLevel(self.level_db)
            } else {
                ToneAction::None
            },
        }
    }

    fn require_ear(&self, operation: &'static str) -> Result<Ear> {
        self.current_ear()
            .ok_or_else(|| TestError::invalid_phase(operation, self.step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> CalibrationFlow {
        let mut flow = CalibrationFlow::new();
        flow.begin().unwrap();
        flow
    }

    // --- Transitions ---

    #[test]
    fn starts_in_setup() {
        let flow = CalibrationFlow::new();
        assert_eq!(flow.step(), CalibrationStep::Setup);
        assert_eq!(flow.level_db(), INITIAL_DB);
        assert_eq!(flow.current_ear(), None);
        assert!(!flow.is_tone_playing());
    }

    #[test]
    fn begin_starts_left_ear_tone() {
        let mut flow = CalibrationFlow::new();
        let action = flow.begin().unwrap();
        assert_eq!(
            action,
            ToneAction::Start {
                frequency_hz: 1000,
                ear: Ear::Left,
                level_db: 40
            }
        );
        assert_eq!(flow.step(), CalibrationStep::LeftEar);
        assert!(flow.is_tone_playing());
    }

    #[test]
    fn begin_twice_is_rejected() {
        let mut flow = started();
        assert!(matches!(flow.begin(), Err(TestError::InvalidPhase { .. })));
    }

    #[test]
    fn full_flow_records_both_ears() {
        let mut flow = started();
        flow.raise().unwrap();
        assert_eq!(flow.confirm().unwrap(), ToneAction::Stop);
        assert_eq!(flow.step(), CalibrationStep::RightEar);
        assert_eq!(flow.level_db(), INITIAL_DB);
        assert!(!flow.is_tone_playing());
        assert_eq!(flow.baseline().left, Some(45));
        assert!(!flow.baseline().is_complete());

        flow.toggle_tone().unwrap();
        flow.lower().unwrap();
        flow.lower().unwrap();
        flow.confirm().unwrap();
        assert!(flow.is_complete());
        assert_eq!(
            flow.baseline(),
            CalibrationBaseline {
                left: Some(45),
                right: Some(30)
            }
        );
    }

    #[test]
    fn complete_rejects_further_changes() {
        let mut flow = started();
        flow.confirm().unwrap();
        flow.confirm().unwrap();
        assert!(flow.raise().is_err());
        assert!(flow.lower().is_err());
        assert!(flow.confirm().is_err());
        assert!(flow.toggle_tone().is_err());
    }

    #[test]
    fn setup_rejects_level_changes() {
        let mut flow = CalibrationFlow::new();
        let err = flow.raise().unwrap_err();
        assert_eq!(err.to_string(), "Cannot raise the level while setup");
    }

    // --- Levels ---

    #[test]
    fn raise_clamps_and_warns_at_max() {
        let mut flow = started();
        let mut warnings = 0;
        for _ in 0..20 {
            if flow.raise().unwrap().max_warning {
                warnings += 1;
            }
        }
        assert_eq!(flow.level_db(), MAX_DB);
        // Every press that lands on the maximum warns
        assert_eq!(warnings, 20 - ((MAX_DB - INITIAL_DB) / STEP_DB) as usize + 1);
    }

    #[test]
    fn raise_below_max_does_not_warn() {
        let mut flow = started();
        let change = flow.raise().unwrap();
        assert!(!change.max_warning);
        assert!(!change.clear_warning);
        assert_eq!(change.level_db, 45);
        assert_eq!(change.tone, ToneAction::SetLevel(45));
    }

    #[test]
    fn lower_clamps_at_min() {
        let mut flow = started();
        for _ in 0..20 {
            let change = flow.lower().unwrap();
            assert!(!change.max_warning);
            assert!(change.clear_warning);
        }
        assert_eq!(flow.level_db(), MIN_DB);
    }

    #[test]
    fn level_change_without_tone_has_no_tone_action() {
        let mut flow = started();
        flow.toggle_tone().unwrap();
        let change = flow.raise().unwrap();
        assert_eq!(change.tone, ToneAction::None);
    }

    // --- Tone ---

    #[test]
    fn toggle_tone_alternates() {
        let mut flow = started();
        assert_eq!(flow.toggle_tone().unwrap(), ToneAction::Stop);
        assert!(matches!(
            flow.toggle_tone().unwrap(),
            ToneAction::Start { ear: Ear::Left, .. }
        ));
    }

    #[test]
    fn right_ear_tone_routes_right() {
        let mut flow = started();
        flow.confirm().unwrap();
        assert!(matches!(
            flow.toggle_tone().unwrap(),
            ToneAction::Start { ear: Ear::Right, level_db: 40, .. }
        ));
    }

    #[test]
    fn stop_tone_is_idempotent() {
        let mut flow = started();
        assert_eq!(flow.stop_tone(), ToneAction::Stop);
        assert_eq!(flow.stop_tone(), ToneAction::None);
    }

    // --- Baseline ---

    #[test]
    fn baseline_json_uses_null_for_missing_ears() {
        let baseline = CalibrationBaseline {
            left: Some(40),
            right: None,
        };
        assert_eq!(
            serde_json::to_string(&baseline).unwrap(),
            r#"{"left":40,"right":null}"#
        );
        assert_eq!(baseline.get(Ear::Left), Some(40));
        assert_eq!(baseline.get(Ear::Right), None);
    }
}
