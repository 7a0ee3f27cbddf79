//! Shared session state and commands
//!
//! `TestCommand` is the command type sent by any frontend.
//! `TestSnapshot` is the read-only view the controller publishes after every
//! change.

use std::fmt;

use earcheck::procedure::{
    CalibrationBaseline, CalibrationStep, EngineSnapshot, TestOutcome,
};
use earcheck::report::Report;

use crate::config::messages::EXIT_WARNING;

/// Commands sent by frontends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCommand {
    /// Leave the welcome screen and begin calibration
    Start,
    /// Accept the resume offer
    Resume,
    /// Decline the resume offer and discard the checkpoint
    StartFresh,

    // Calibration
    ToggleCalibrationTone,
    RaiseLevel,
    LowerLevel,
    /// Record the current level for this ear
    ConfirmLevel,

    // Testing
    PlayTone,
    Respond { heard: bool },

    /// Back to the welcome screen from results
    Restart,
    Shutdown,
}

/// Top-level screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Welcome,
    ResumePrompt,
    Calibrating,
    Preparing,
    Testing,
    Processing,
    Results,
}

impl Stage {
    /// Warning shown when the user tries to leave
    pub fn exit_warning(self) -> Option<&'static str> {
        match self {
            Stage::Calibrating | Stage::Testing => Some(EXIT_WARNING),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Welcome => "welcome",
            Stage::ResumePrompt => "resume prompt",
            Stage::Calibrating => "calibrating",
            Stage::Preparing => "preparing",
            Stage::Testing => "testing",
            Stage::Processing => "processing",
            Stage::Results => "results",
        };
        f.write_str(name)
    }
}

/// Calibration state for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationView {
    pub step: CalibrationStep,
    pub level_db: i32,
    pub tone_playing: bool,
    pub baseline: CalibrationBaseline,
}

/// Saved progress on offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeOffer {
    pub progress_index: usize,
    pub total: usize,
    /// Unix seconds
    pub saved_at: u64,
}

/// Snapshot of the session, shared between the controller and frontends
#[derive(Debug, Clone, Default)]
pub struct TestSnapshot {
    pub stage: Stage,
    pub calibration: Option<CalibrationView>,
    pub engine: Option<EngineSnapshot>,
    pub resume_offer: Option<ResumeOffer>,
    /// Countdown ticks left before the tone plays
    pub countdown: Option<u8>,
    /// A tone is sounding; answers are not accepted
    pub tone_playing: bool,
    /// Pause after an answer
    pub transitioning: bool,
    /// Transient inline warning
    pub warning: Option<String>,
    /// Transient progress message
    pub milestone: Option<String>,
    pub inactivity_nudge: bool,
    pub exit_warning: Option<&'static str>,
    pub audio_available: bool,
    pub outcome: Option<TestOutcome>,
    pub report: Option<Report>,
    pub last_error: Option<String>,
}

impl TestSnapshot {
    /// Answer buttons should be enabled
    pub fn accepts_response(&self) -> bool {
        self.stage == Stage::Testing
            && self.countdown.is_none()
            && !self.tone_playing
            && !self.transitioning
    }

    /// Play button should be enabled
    pub fn accepts_play(&self) -> bool {
        self.accepts_response()
            && self
                .engine
                .as_ref()
                .is_some_and(|e| e.phase == earcheck::procedure::TestPhase::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_warning_only_while_measuring() {
        assert!(Stage::Calibrating.exit_warning().is_some());
        assert!(Stage::Testing.exit_warning().is_some());
        for stage in [
            Stage::Welcome,
            Stage::ResumePrompt,
            Stage::Preparing,
            Stage::Processing,
            Stage::Results,
        ] {
            assert!(stage.exit_warning().is_none(), "{}", stage);
        }
    }

    #[test]
    fn default_snapshot_accepts_nothing() {
        let snapshot = TestSnapshot::default();
        assert_eq!(snapshot.stage, Stage::Welcome);
        assert!(!snapshot.accepts_response());
        assert!(!snapshot.accepts_play());
    }

    #[test]
    fn countdown_blocks_response() {
        let snapshot = TestSnapshot {
            stage: Stage::Testing,
            countdown: Some(2),
            ..TestSnapshot::default()
        };
        assert!(!snapshot.accepts_response());
    }
}
