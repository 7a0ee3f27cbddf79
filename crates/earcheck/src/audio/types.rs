//! Shared audio types
//!
//! Pure data types used across the audio subsystem.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::tone::ToneTiming;

/// Which ear a stimulus is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ear {
    Left,
    Right,
}

impl Ear {
    /// Both ears in test order
    pub const BOTH: [Ear; 2] = [Ear::Left, Ear::Right];

    /// Per-channel gains for hard panning: (left, right)
    pub fn channel_gains(self) -> (f32, f32) {
        match self {
            Ear::Left => (1.0, 0.0),
            Ear::Right => (0.0, 1.0),
        }
    }
}

impl fmt::Display for Ear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ear::Left => write!(f, "Left"),
            Ear::Right => write!(f, "Right"),
        }
    }
}

/// A fully resolved pulse-train presentation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseRequest {
    pub frequency_hz: u32,
    /// Linear gain in 0.0..=1.0; ignored when `silent`
    pub gain: f32,
    pub ear: Ear,
    /// Run the full timing at zero gain
    pub silent: bool,
    pub timing: ToneTiming,
}

impl PulseRequest {
    /// Gain actually rendered
    pub fn effective_gain(&self) -> f32 {
        if self.silent {
            0.0
        } else {
            self.gain.clamp(0.0, 1.0)
        }
    }
}

/// Commands sent to the tone engine
#[derive(Debug, Clone)]
pub enum ToneCommand {
    /// Stop whatever is sounding and present a pulse train.
    /// `ToneEvent::Finished` with the same id fires when its timing elapses.
    Present { id: u64, request: PulseRequest },
    /// Stop whatever is sounding and start a continuous reference tone
    StartSteady {
        frequency_hz: u32,
        gain: f32,
        ear: Ear,
    },
    /// Change the level of the continuous tone
    SetSteadyGain(f32),
    /// Silence output and forget any pending presentation
    Stop,
    /// User gesture: retry the output device if it is unavailable
    Resume,
    /// Shut down the engine thread
    Shutdown,
}

/// Events emitted by the tone engine
#[derive(Debug, Clone, PartialEq)]
pub enum ToneEvent {
    /// A presentation's full timing has elapsed
    Finished { id: u64 },
    /// The output device could not be opened; tones run silently
    OutputUnavailable(String),
    /// The output device came back after being unavailable
    OutputRestored,
}
