//! Stimulus sequence
//!
//! The ordered list of (ear, frequency) combinations, fixed at session
//! start: every frequency for the left ear ascending, then the right ear.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audio::Ear;
use crate::config::stimuli::FREQUENCIES_HZ;

/// One (frequency, ear) combination to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stimulus {
    pub frequency_hz: u32,
    pub ear: Ear,
}

impl Stimulus {
    pub fn new(frequency_hz: u32, ear: Ear) -> Self {
        Self { frequency_hz, ear }
    }

    /// Display label: "500 Hz", "1 kHz", "2.5 kHz"
    pub fn frequency_label(&self) -> String {
        frequency_label(self.frequency_hz)
    }
}

impl fmt::Display for Stimulus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ear · {}", self.ear, self.frequency_label())
    }
}

/// Format a frequency for display
pub fn frequency_label(frequency_hz: u32) -> String {
    if frequency_hz >= 1000 {
        if frequency_hz % 1000 == 0 {
            format!("{} kHz", frequency_hz / 1000)
        } else {
            format!("{} kHz", f64::from(frequency_hz) / 1000.0)
        }
    } else {
        format!("{} Hz", frequency_hz)
    }
}

/// Immutable, ordered stimulus list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusSequence {
    stimuli: Vec<Stimulus>,
}

impl Default for StimulusSequence {
    fn default() -> Self {
        Self::standard()
    }
}

impl StimulusSequence {
    /// 500–8000 Hz, left ear then right ear
    pub fn standard() -> Self {
        Self::from_frequencies(&FREQUENCIES_HZ)
    }

    /// Build from any frequency set; sorted ascending, duplicates and zero removed
    pub fn from_frequencies(frequencies: &[u32]) -> Self {
        let mut freqs: Vec<u32> = frequencies.iter().copied().filter(|&f| f > 0).collect();
        freqs.sort_unstable();
        freqs.dedup();

        let stimuli = Ear::BOTH
            .iter()
            .flat_map(|&ear| freqs.iter().map(move |&f| Stimulus::new(f, ear)))
            .collect();
        Self { stimuli }
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Stimulus> {
        self.stimuli.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stimulus> {
        self.stimuli.iter()
    }

    /// Indices of the stimuli that belong to one ear
    pub fn indices_for(&self, ear: Ear) -> Vec<usize> {
        self.stimuli
            .iter()
            .enumerate()
            .filter(|(_, s)| s.ear == ear)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of stimuli per ear
    pub fn per_ear(&self) -> usize {
        self.indices_for(Ear::Left).len()
    }

    /// Distinct frequencies, ascending
    pub fn frequencies(&self) -> Vec<u32> {
        self.stimuli
            .iter()
            .filter(|s| s.ear == Ear::Left)
            .map(|s| s.frequency_hz)
            .collect()
    }
}
