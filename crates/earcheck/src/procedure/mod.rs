//! Test procedure
//!
//! Calibration, the stimulus sequence, and the adaptive threshold search.

pub mod calibration;
pub mod catch_trial;
pub mod session;
pub mod staircase;
pub mod stimulus;

pub use calibration::{CalibrationBaseline, CalibrationFlow, CalibrationStep, LevelChange, ToneAction};
pub use catch_trial::{CatchPlan, CatchTrialRecord};
pub use session::{
    EngineSnapshot, Presentation, ResponseOutcome, TestOutcome, TestPhase, TestProgress,
    ThresholdEngine,
};
pub use staircase::{
    Direction, PresentationRecord, Resolution, Staircase, StaircaseParams, StaircaseStep,
    ThresholdResult,
};
pub use stimulus::{Stimulus, StimulusSequence};
