//! Threshold engine
//!
//! One explicit session object that walks the stimulus sequence, owns the
//! staircase for the current stimulus, injects catch trials and appends
//! results. Callers read it through [`EngineSnapshot`] and drive it with
//! three transitions:
//!
//! ```text
//! Idle --next_presentation--> Presenting --tone_finished--> AwaitingResponse
//!   ^                                                            |
//!   +-------------------------- respond -------------------------+
//! ```
//!
//! `respond` moves to `Complete` after the last stimulus resolves.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::Ear;
use crate::config::timing::AVG_SECS_PER_TONE;
use crate::error::{Result, TestError};

use super::calibration::CalibrationBaseline;
use super::catch_trial::{CatchPlan, CatchTrialRecord};
use super::staircase::{Direction, Staircase, StaircaseParams, StaircaseStep, ThresholdResult};
use super::stimulus::{Stimulus, StimulusSequence};

/// Per-stimulus phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestPhase {
    #[default]
    Idle,
    Presenting,
    AwaitingResponse,
    Complete,
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestPhase::Idle => write!(f, "idle"),
            TestPhase::Presenting => write!(f, "presenting"),
            TestPhase::AwaitingResponse => write!(f, "awaiting a response"),
            TestPhase::Complete => write!(f, "complete"),
        }
    }
}

/// A tone the caller must play before calling `tone_finished`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    /// Position in the stimulus sequence
    pub index: usize,
    pub stimulus: Stimulus,
    pub level_db: i32,
    /// Render at zero gain. Set exactly for catch trials.
    pub silent: bool,
}

impl Presentation {
    pub fn is_catch_trial(&self) -> bool {
        self.silent
    }
}

/// What a response did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Catch trial scored; the same stimulus is presented next at its normal level
    CatchTrial { false_positive: bool },
    /// Staircase continues
    Continue { next_level: i32 },
    /// Stimulus resolved, `next` comes up
    Resolved {
        result: ThresholdResult,
        next: Stimulus,
    },
    /// Last stimulus resolved; the session is complete
    Finished { result: ThresholdResult },
}

impl ResponseOutcome {
    /// Result produced by this response, if any
    pub fn result(&self) -> Option<&ThresholdResult> {
        match self {
            ResponseOutcome::Resolved { result, .. } | ResponseOutcome::Finished { result } => {
                Some(result)
            }
            _ => None,
        }
    }
}

/// Position and remaining-time estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestProgress {
    /// Index of the current stimulus (equals `completed`)
    pub index: usize,
    pub completed: usize,
    pub total: usize,
    pub remaining_stimuli: usize,
    /// Catch trials not yet answered
    pub remaining_catch_trials: usize,
    pub estimated_secs_remaining: u64,
}

impl TestProgress {
    /// Completed share in whole percent
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (self.completed * 100 / self.total) as u8
    }
}

/// Read-only view for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub phase: TestPhase,
    pub stimulus: Option<Stimulus>,
    pub current_level: i32,
    pub direction: Direction,
    pub presentation_count: u32,
    /// The presentation in flight (or awaiting an answer) is a catch trial
    pub in_catch_trial: bool,
    /// Some tone has been played for the current stimulus
    pub tone_played: bool,
    pub catch_trials: CatchTrialRecord,
    pub progress: TestProgress,
}

/// Adaptive threshold engine for a whole session
#[derive(Debug, Clone)]
pub struct ThresholdEngine {
    params: StaircaseParams,
    sequence: StimulusSequence,
    catch_plan: CatchPlan,
    index: usize,
    staircase: Staircase,
    phase: TestPhase,
    catch_pending: bool,
    in_catch_trial: bool,
    tone_played: bool,
    results: Vec<ThresholdResult>,
    catch_trials: CatchTrialRecord,
}

impl ThresholdEngine {
    /// Fresh session at the first stimulus
    pub fn new(
        params: StaircaseParams,
        sequence: StimulusSequence,
        catch_plan: CatchPlan,
    ) -> Result<Self> {
        Self::resume(
            params,
            sequence,
            catch_plan,
            Vec::new(),
            CatchTrialRecord::default(),
        )
    }

    /// Continue a session at the boundary after `results`.
    ///
    /// `results` must be the leading stimuli of `sequence`, in order.
    pub fn resume(
        params: StaircaseParams,
        sequence: StimulusSequence,
        catch_plan: CatchPlan,
        results: Vec<ThresholdResult>,
        catch_trials: CatchTrialRecord,
    ) -> Result<Self> {
        params.validate()?;
        if sequence.is_empty() {
            return Err(TestError::InvalidParams(
                "stimulus sequence is empty".to_string(),
            ));
        }
        if results.len() > sequence.len() {
            return Err(TestError::InvalidParams(format!(
                "{} results for {} stimuli",
                results.len(),
                sequence.len()
            )));
        }
        for (i, result) in results.iter().enumerate() {
            let expected = sequence.get(i);
            if expected != Some(Stimulus::new(result.frequency_hz, result.ear)) {
                return Err(TestError::InvalidParams(format!(
                    "result {} ({} Hz, {}) does not match the stimulus sequence",
                    i, result.frequency_hz, result.ear
                )));
            }
        }

        let index = results.len();
        let complete = index == sequence.len();
        Ok(Self {
            params,
            catch_pending: !complete && catch_plan.contains(index),
            sequence,
            catch_plan,
            index,
            staircase: Staircase::new(params),
            phase: if complete {
                TestPhase::Complete
            } else {
                TestPhase::Idle
            },
            in_catch_trial: false,
            tone_played: false,
            results,
            catch_trials,
        })
    }

    // --- Transitions ---

    /// Start the next presentation of the current stimulus.
    ///
    /// A pending catch trial goes first, silent and at the current level.
    pub fn next_presentation(&mut self) -> Result<Presentation> {
        if self.phase != TestPhase::Idle {
            return Err(TestError::invalid_phase("present a tone", self.phase));
        }
        let stimulus = self.current_stimulus().ok_or_else(|| {
            TestError::invalid_phase("present a tone", TestPhase::Complete)
        })?;

        self.in_catch_trial = self.catch_pending;
        self.tone_played = true;
        self.phase = TestPhase::Presenting;

        let presentation = Presentation {
            index: self.index,
            stimulus,
            level_db: self.staircase.current_level(),
            silent: self.in_catch_trial,
        };
        debug!(
            "Presenting {} at {} dB{}",
            stimulus,
            presentation.level_db,
            if presentation.silent { " (catch)" } else { "" }
        );
        Ok(presentation)
    }

    /// The tone has played out; responses are accepted from now on
    pub fn tone_finished(&mut self) -> Result<()> {
        if self.phase != TestPhase::Presenting {
            return Err(TestError::invalid_phase("finish a tone", self.phase));
        }
        self.phase = TestPhase::AwaitingResponse;
        Ok(())
    }

    /// Apply a heard / not-heard answer.
    ///
    /// Rejected with [`TestError::PrematureResponse`] unless a tone has
    /// finished playing and is awaiting its answer.
    pub fn respond(&mut self, heard: bool) -> Result<ResponseOutcome> {
        match self.phase {
            TestPhase::AwaitingResponse => {}
            TestPhase::Complete => {
                return Err(TestError::invalid_phase("respond", self.phase));
            }
            TestPhase::Idle | TestPhase::Presenting => {
                return Err(TestError::PrematureResponse);
            }
        }

        if self.in_catch_trial {
            self.catch_trials.record(heard);
            self.catch_pending = false;
            self.in_catch_trial = false;
            self.phase = TestPhase::Idle;
            debug!(
                "Catch trial answered {}, {}/{} false positives",
                if heard { "heard" } else { "not heard" },
                self.catch_trials.false_positives,
                self.catch_trials.total
            );
            return Ok(ResponseOutcome::CatchTrial {
                false_positive: heard,
            });
        }

        match self.staircase.record(heard) {
            StaircaseStep::Continue { next_level } => {
                self.phase = TestPhase::Idle;
                Ok(ResponseOutcome::Continue { next_level })
            }
            StaircaseStep::Resolved { .. } => {
                let stimulus = self
                    .current_stimulus()
                    .ok_or_else(|| TestError::invalid_phase("respond", TestPhase::Complete))?;
                let result = self
                    .staircase
                    .to_result(stimulus)
                    .ok_or_else(|| TestError::invalid_phase("resolve", self.phase))?;
                debug!(
                    "{} resolved at {} dB after {} presentations ({:?})",
                    stimulus, result.threshold_db, result.presentations, result.resolution
                );
                self.results.push(result.clone());
                Ok(self.advance(result))
            }
        }
    }

    fn advance(&mut self, result: ThresholdResult) -> ResponseOutcome {
        self.index += 1;
        self.staircase = Staircase::new(self.params);
        self.in_catch_trial = false;
        self.tone_played = false;
        match self.current_stimulus() {
            Some(next) => {
                self.catch_pending = self.catch_plan.contains(self.index);
                self.phase = TestPhase::Idle;
                ResponseOutcome::Resolved { result, next }
            }
            None => {
                self.catch_pending = false;
                self.phase = TestPhase::Complete;
                ResponseOutcome::Finished { result }
            }
        }
    }

    // --- Queries ---

    pub fn phase(&self) -> TestPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == TestPhase::Complete
    }

    /// Index of the current stimulus; equals the number of results
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_stimulus(&self) -> Option<Stimulus> {
        self.sequence.get(self.index)
    }

    pub fn staircase(&self) -> &Staircase {
        &self.staircase
    }

    pub fn params(&self) -> &StaircaseParams {
        &self.params
    }

    pub fn sequence(&self) -> &StimulusSequence {
        &self.sequence
    }

    pub fn catch_plan(&self) -> &CatchPlan {
        &self.catch_plan
    }

    pub fn results(&self) -> &[ThresholdResult] {
        &self.results
    }

    pub fn catch_trials(&self) -> CatchTrialRecord {
        self.catch_trials
    }

    /// Whether the current stimulus has had any tone played
    pub fn tone_played(&self) -> bool {
        self.tone_played
    }

    /// The next stimulus is the last one in the sequence
    pub fn on_last_stimulus(&self) -> bool {
        !self.is_complete() && self.index + 1 == self.sequence.len()
    }

    /// Every stimulus of `ear` has a result
    pub fn ear_complete(&self, ear: Ear) -> bool {
        self.sequence
            .indices_for(ear)
            .iter()
            .all(|&i| i < self.results.len())
    }

    pub fn progress(&self) -> TestProgress {
        let total = self.sequence.len();
        let completed = self.results.len();
        let remaining_stimuli = total - completed;
        let upcoming = if self.is_complete() {
            0
        } else {
            self.catch_plan.remaining_from(self.index + 1)
        };
        let remaining_catch_trials = upcoming + usize::from(self.catch_pending);
        TestProgress {
            index: self.index,
            completed,
            total,
            remaining_stimuli,
            remaining_catch_trials,
            estimated_secs_remaining: (remaining_stimuli + remaining_catch_trials) as u64
                * AVG_SECS_PER_TONE,
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            phase: self.phase,
            stimulus: self.current_stimulus(),
            current_level: self.staircase.current_level(),
            direction: self.staircase.direction(),
            presentation_count: self.staircase.presentation_count(),
            in_catch_trial: self.in_catch_trial,
            tone_played: self.tone_played,
            catch_trials: self.catch_trials,
            progress: self.progress(),
        }
    }

    /// Completion handoff; `None` until every stimulus is resolved
    pub fn outcome(&self, baseline: CalibrationBaseline, timestamp: u64) -> Option<TestOutcome> {
        self.is_complete()
            .then(|| TestOutcome::new(&self.results, baseline, self.catch_trials, timestamp))
    }
}

/// The single result object handed to the surrounding application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub left_ear_thresholds: Vec<ThresholdResult>,
    pub right_ear_thresholds: Vec<ThresholdResult>,
    pub calibration_baseline: CalibrationBaseline,
    pub catch_trial_record: CatchTrialRecord,
    pub false_positive_rate: f64,
    pub reliable: bool,
    /// Unix seconds
    pub timestamp: u64,
}

impl TestOutcome {
    pub fn new(
        results: &[ThresholdResult],
        calibration_baseline: CalibrationBaseline,
        catch_trial_record: CatchTrialRecord,
        timestamp: u64,
    ) -> Self {
        let for_ear = |ear: Ear| -> Vec<ThresholdResult> {
            results.iter().filter(|r| r.ear == ear).cloned().collect()
        };
        Self {
            left_ear_thresholds: for_ear(Ear::Left),
            right_ear_thresholds: for_ear(Ear::Right),
            calibration_baseline,
            catch_trial_record,
            false_positive_rate: catch_trial_record.false_positive_rate(),
            reliable: catch_trial_record.is_reliable(),
            timestamp,
        }
    }

    /// Left then right results
    pub fn thresholds(&self) -> Vec<ThresholdResult> {
        self.left_ear_thresholds
            .iter()
            .chain(&self.right_ear_thresholds)
            .cloned()
            .collect()
    }
}
