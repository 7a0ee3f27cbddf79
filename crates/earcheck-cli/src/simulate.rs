//! Headless session against a virtual listener

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use earcheck::audio::Ear;
use earcheck::procedure::{
    CalibrationFlow, CatchPlan, Presentation, TestOutcome, ThresholdEngine,
};
use earcheck_app::data::Settings;
use earcheck_app::error::{AppError, Result};

/// True hearing thresholds, one per test frequency (or one for all)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile(Vec<i32>);

impl Profile {
    /// Threshold for the `slot`-th test frequency
    fn threshold(&self, slot: usize) -> Option<i32> {
        match self.0.as_slice() {
            [single] => Some(*single),
            values => values.get(slot).copied(),
        }
    }

    fn check(&self, frequencies: usize) -> Result<()> {
        if self.0.len() == 1 || self.0.len() == frequencies {
            Ok(())
        } else {
            Err(AppError::Config(format!(
                "profile has {} thresholds, expected 1 or {}",
                self.0.len(),
                frequencies
            )))
        }
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<i32>()
                    .map_err(|e| format!("invalid threshold '{}': {}", v.trim(), e))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if values.is_empty() {
            return Err("profile is empty".to_string());
        }
        Ok(Self(values))
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

/// Answers "heard" at or above its true threshold
pub struct VirtualListener {
    frequencies: Vec<u32>,
    left: Profile,
    right: Profile,
    /// Answer to silent catch trials
    guess: bool,
}

impl VirtualListener {
    pub fn new(settings: &Settings, left: Profile, right: Profile, guess: bool) -> Result<Self> {
        let mut frequencies = settings.frequencies_hz.clone();
        frequencies.sort_unstable();
        frequencies.dedup();
        left.check(frequencies.len())?;
        right.check(frequencies.len())?;
        Ok(Self {
            frequencies,
            left,
            right,
            guess,
        })
    }

    fn answer(&self, presentation: &Presentation) -> bool {
        if presentation.silent {
            return self.guess;
        }
        let stimulus = presentation.stimulus;
        let slot = self
            .frequencies
            .iter()
            .position(|&f| f == stimulus.frequency_hz)
            .unwrap_or(0);
        let profile = match stimulus.ear {
            Ear::Left => &self.left,
            Ear::Right => &self.right,
        };
        profile
            .threshold(slot)
            .is_some_and(|t| presentation.level_db >= t)
    }
}

/// Run calibration and the full threshold search, answering as `listener`.
///
/// The catch plan is drawn from `seed`, so equal inputs give equal outcomes.
pub fn run(settings: &Settings, listener: &VirtualListener, seed: u64) -> Result<TestOutcome> {
    settings.validate()?;

    // Listener accepts the default reference level in both ears
    let mut calibration = CalibrationFlow::new();
    calibration.begin()?;
    calibration.confirm()?;
    calibration.confirm()?;
    let baseline = calibration.baseline();

    let sequence = settings.sequence();
    let plan = CatchPlan::random(
        &sequence,
        settings.catch_trials_per_ear,
        &mut StdRng::seed_from_u64(seed),
    );
    let mut engine = ThresholdEngine::new(settings.staircase, sequence, plan)?;

    while !engine.is_complete() {
        let presentation = engine.next_presentation()?;
        engine.tone_finished()?;
        let heard = listener.answer(&presentation);
        debug!(
            "{} at {} dB{}: {}",
            presentation.stimulus,
            presentation.level_db,
            if presentation.silent { " (catch)" } else { "" },
            if heard { "heard" } else { "not heard" }
        );
        engine.respond(heard)?;
    }

    engine
        .outcome(baseline, earcheck_app::data::unix_timestamp())
        .ok_or_else(|| AppError::Config("session ended without an outcome".to_string()))
}
