//! Catch trials
//!
//! A catch trial is a silent presentation slipped in before the first real
//! presentation of a designated stimulus. A "heard" answer to it is a false
//! positive. Catch trials never touch the staircase.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::audio::Ear;
use crate::config::scoring::MAX_RELIABLE_FALSE_POSITIVE_RATE;

use super::stimulus::StimulusSequence;

/// Session-wide catch-trial tally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchTrialRecord {
    pub total: u32,
    pub false_positives: u32,
}

impl CatchTrialRecord {
    /// Score one answered catch trial
    pub fn record(&mut self, heard: bool) {
        self.total += 1;
        if heard {
            self.false_positives += 1;
        }
    }

    /// `false_positives / total`, or 0 with no catch trials
    pub fn false_positive_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.false_positives) / f64::from(self.total)
        }
    }

    pub fn is_reliable(&self) -> bool {
        self.false_positive_rate() <= MAX_RELIABLE_FALSE_POSITIVE_RATE
    }
}

/// Stimulus indices that open with a catch trial. Chosen once per session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatchPlan {
    indices: BTreeSet<usize>,
}

impl CatchPlan {
    /// No catch trials
    pub fn none() -> Self {
        Self::default()
    }

    /// Explicit indices
    pub fn fixed(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            indices: indices.into_iter().collect(),
        }
    }

    /// `per_ear` distinct indices drawn uniformly from each ear's stimuli
    pub fn random<R: Rng>(sequence: &StimulusSequence, per_ear: usize, rng: &mut R) -> Self {
        let mut indices = BTreeSet::new();
        for ear in Ear::BOTH {
            let mut pool = sequence.indices_for(ear);
            let take = per_ear.min(pool.len());
            // Partial Fisher-Yates
            for i in 0..take {
                let j = rng.random_range(i..pool.len());
                pool.swap(i, j);
            }
            indices.extend(pool.into_iter().take(take));
        }
        Self { indices }
    }

    /// Whether the stimulus at `index` opens with a catch trial
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Catch trials at or after `index`
    pub fn remaining_from(&self, index: usize) -> usize {
        self.indices.range(index..).count()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }
}
