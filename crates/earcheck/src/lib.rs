//! Earcheck: pure-tone hearing screening engine
//!
//! Tone synthesis, calibration, adaptive threshold search, and audiogram scoring.
//!
//! ## Quick start
//!
//! ```no_run
//! use earcheck::procedure::{
//!     CalibrationBaseline, CatchPlan, StaircaseParams, StimulusSequence, ThresholdEngine,
//! };
//! use earcheck::report::Report;
//!
//! let mut engine = ThresholdEngine::new(
//!     StaircaseParams::default(),
//!     StimulusSequence::standard(),
//!     CatchPlan::none(),
//! )?;
//! while !engine.is_complete() {
//!     let _tone = engine.next_presentation()?;
//!     engine.tone_finished()?;
//!     engine.respond(true)?;
//! }
//! let _report = Report::generate(
//!     engine.results(),
//!     &CalibrationBaseline::default(),
//!     &engine.catch_trials(),
//! );
//! # Ok::<(), earcheck::error::TestError>(())
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod procedure;
pub mod report;
