//! Audio subsystem
//!
//! Handles tone synthesis, level mapping, and device output.
//!

pub mod engine;
pub mod level;
pub mod output;
pub mod tone;
pub mod types;

pub use engine::ToneEngine;
pub use level::LevelMapper;
pub use output::{open_default_output, open_null_output, NullOutput, OutputFactory, ToneOutput};
pub use tone::{PulseTrain, SteadyGain, SteadyTone, ToneTiming};
pub use types::{Ear, PulseRequest, ToneCommand, ToneEvent};
