//! Adaptive staircase
//!
//! A simplified Hughson-Westlake search for one stimulus: descend by
//! `step_down_db` while the tone is heard, ascend by `step_up_db` once it is
//! missed, and stop at the first "heard" while ascending. The floor, the
//! ceiling and a presentation cap guarantee termination.
//!
//! Pure logic, no timing or audio.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audio::Ear;
use crate::config::staircase::{
    CEILING_DB, FLOOR_DB, LEVEL_LIMIT_DB, MAX_PRESENTATIONS, START_DB, STEP_DOWN_DB, STEP_UP_DB,
};
use crate::error::{Result, TestError};

use super::stimulus::Stimulus;

/// Staircase tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaircaseParams {
    pub start_db: i32,
    pub step_down_db: i32,
    pub step_up_db: i32,
    pub floor_db: i32,
    pub ceiling_db: i32,
    pub max_presentations: u32,
}

impl Default for StaircaseParams {
    fn default() -> Self {
        Self {
            start_db: START_DB,
            step_down_db: STEP_DOWN_DB,
            step_up_db: STEP_UP_DB,
            floor_db: FLOOR_DB,
            ceiling_db: CEILING_DB,
            max_presentations: MAX_PRESENTATIONS,
        }
    }
}

impl StaircaseParams {
    /// Reject parameter sets that could not terminate or would start out of range
    pub fn validate(&self) -> Result<()> {
        let limit = -LEVEL_LIMIT_DB..=LEVEL_LIMIT_DB;
        if !limit.contains(&self.floor_db) || !limit.contains(&self.ceiling_db) {
            return Err(TestError::InvalidParams(format!(
                "floor and ceiling must lie within ±{} dB",
                LEVEL_LIMIT_DB
            )));
        }
        if self.floor_db > self.ceiling_db {
            return Err(TestError::InvalidParams(format!(
                "floor {} dB is above ceiling {} dB",
                self.floor_db, self.ceiling_db
            )));
        }
        if !(self.floor_db..=self.ceiling_db).contains(&self.start_db) {
            return Err(TestError::InvalidParams(format!(
                "start level {} dB is outside {}..={} dB",
                self.start_db, self.floor_db, self.ceiling_db
            )));
        }
        let steps = 1..=LEVEL_LIMIT_DB;
        if !steps.contains(&self.step_down_db) || !steps.contains(&self.step_up_db) {
            return Err(TestError::InvalidParams(format!(
                "step sizes must be within 1..={} dB",
                LEVEL_LIMIT_DB
            )));
        }
        if self.max_presentations == 0 {
            return Err(TestError::InvalidParams(
                "presentation cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Direction of travel through the level range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Descending,
    Ascending,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Descending => write!(f, "Descending"),
            Direction::Ascending => write!(f, "Ascending"),
        }
    }
}

/// One answered, non-catch presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationRecord {
    pub level: i32,
    pub heard: bool,
    pub direction: Direction,
}

/// Why a staircase stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Heard while ascending
    Reversal,
    /// Still heard at the floor
    Floor,
    /// Missed up to the ceiling
    Ceiling,
    /// Presentation cap reached; best-effort estimate
    SafetyCap,
}

/// Outcome of recording one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaircaseStep {
    /// Present again at `next_level`
    Continue { next_level: i32 },
    /// Threshold established
    Resolved {
        threshold_db: i32,
        resolution: Resolution,
    },
}

/// Measured threshold for one stimulus. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdResult {
    #[serde(rename = "frequency")]
    pub frequency_hz: u32,
    pub ear: Ear,
    #[serde(rename = "thresholdLevel")]
    pub threshold_db: i32,
    pub presentations: u32,
    pub history: Vec<PresentationRecord>,
    #[serde(default = "default_resolution")]
    pub resolution: Resolution,
}

fn default_resolution() -> Resolution {
    Resolution::Reversal
}

/// Per-stimulus staircase state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staircase {
    params: StaircaseParams,
    current_level: i32,
    direction: Direction,
    history: Vec<PresentationRecord>,
    resolved: Option<(i32, Resolution)>,
}

impl Staircase {
    pub fn new(params: StaircaseParams) -> Self {
        Self {
            params,
            current_level: params.start_db.clamp(params.floor_db, params.ceiling_db),
            direction: Direction::Descending,
            history: Vec::new(),
            resolved: None,
        }
    }

    /// Level the next presentation plays at
    pub fn current_level(&self) -> i32 {
        self.current_level
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Answered non-catch presentations so far; always `history().len()`
    pub fn presentation_count(&self) -> u32 {
        self.history.len() as u32
    }

    pub fn history(&self) -> &[PresentationRecord] {
        &self.history
    }

    pub fn params(&self) -> &StaircaseParams {
        &self.params
    }

    /// Threshold and reason, once resolved
    pub fn resolution(&self) -> Option<(i32, Resolution)> {
        self.resolved
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Record the response to a presentation at `current_level`.
    ///
    /// After resolution further calls change nothing and repeat the result.
    pub fn record(&mut self, heard: bool) -> StaircaseStep {
        if let Some((threshold_db, resolution)) = self.resolved {
            return StaircaseStep::Resolved {
                threshold_db,
                resolution,
            };
        }

        let level = self.current_level;
        let direction = self.direction;
        self.history.push(PresentationRecord {
            level,
            heard,
            direction,
        });

        let p = self.params;
        let natural = match (heard, direction) {
            (true, Direction::Ascending) => Some((level, Resolution::Reversal)),
            (true, Direction::Descending) => {
                if level <= p.floor_db {
                    Some((p.floor_db, Resolution::Floor))
                } else {
                    self.current_level = level.saturating_sub(p.step_down_db).max(p.floor_db);
                    None
                }
            }
            (false, _) => {
                let next = level.saturating_add(p.step_up_db).min(p.ceiling_db);
                if next >= p.ceiling_db {
                    Some((p.ceiling_db, Resolution::Ceiling))
                } else {
                    self.current_level = next;
                    self.direction = Direction::Ascending;
                    None
                }
            }
        };

        let resolved = match natural {
            Some(r) => Some(r),
            None if self.presentation_count() >= p.max_presentations => {
                Some((self.forced_threshold(), Resolution::SafetyCap))
            }
            None => None,
        };

        match resolved {
            Some((threshold_db, resolution)) => {
                self.resolved = Some((threshold_db, resolution));
                StaircaseStep::Resolved {
                    threshold_db,
                    resolution,
                }
            }
            None => StaircaseStep::Continue {
                next_level: self.current_level,
            },
        }
    }

    /// Lowest ascending "heard" level, else the last presented level
    fn forced_threshold(&self) -> i32 {
        self.history
            .iter()
            .filter(|r| r.heard && r.direction == Direction::Ascending)
            .map(|r| r.level)
            .min()
            .or_else(|| self.history.last().map(|r| r.level))
            .unwrap_or(self.current_level)
    }

    /// Freeze into a result for `stimulus`; `None` while unresolved
    pub fn to_result(&self, stimulus: Stimulus) -> Option<ThresholdResult> {
        let (threshold_db, resolution) = self.resolved?;
        Some(ThresholdResult {
            frequency_hz: stimulus.frequency_hz,
            ear: stimulus.ear,
            threshold_db,
            presentations: self.presentation_count(),
            history: self.history.clone(),
            resolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(params: StaircaseParams, responses: &[bool]) -> (Staircase, Vec<StaircaseStep>) {
        let mut staircase = Staircase::new(params);
        let steps = responses.iter().map(|&h| staircase.record(h)).collect();
        (staircase, steps)
    }

    /// Drive until resolved with a fixed answer
    fn run_constant(params: StaircaseParams, heard: bool) -> Staircase {
        let mut staircase = Staircase::new(params);
        for _ in 0..100 {
            if let StaircaseStep::Resolved { .. } = staircase.record(heard) {
                break;
            }
        }
        staircase
    }

    // --- Params ---

    #[test]
    fn default_params() {
        let p = StaircaseParams::default();
        assert_eq!(
            (p.start_db, p.step_down_db, p.step_up_db, p.floor_db, p.ceiling_db, p.max_presentations),
            (35, 10, 5, -10, 80, 10)
        );
        assert!(p.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_params() {
        let base = StaircaseParams::default();
        let cases = [
            StaircaseParams { floor_db: 90, ..base },
            StaircaseParams { start_db: 100, ..base },
            StaircaseParams { start_db: -20, ..base },
            StaircaseParams { step_down_db: 0, ..base },
            StaircaseParams { step_up_db: -5, ..base },
            StaircaseParams { max_presentations: 0, ..base },
            StaircaseParams { step_up_db: i32::MAX, ceiling_db: i32::MAX, ..base },
            StaircaseParams { step_down_db: i32::MAX, floor_db: i32::MIN, ..base },
            StaircaseParams { ceiling_db: 201, ..base },
            StaircaseParams { step_down_db: 201, ..base },
        ];
        for params in cases {
            assert!(params.validate().is_err(), "{:?} should be rejected", params);
        }
    }

    #[test]
    fn params_deserialize_with_missing_fields() {
        let p: StaircaseParams = serde_json::from_str(r#"{"start_db": 40}"#).unwrap();
        assert_eq!(p.start_db, 40);
        assert_eq!(p.step_down_db, 10);
    }

    #[test]
    fn widest_accepted_params_stay_in_range() {
        let params = StaircaseParams {
            start_db: 0,
            step_down_db: LEVEL_LIMIT_DB,
            step_up_db: LEVEL_LIMIT_DB,
            floor_db: -LEVEL_LIMIT_DB,
            ceiling_db: LEVEL_LIMIT_DB,
            max_presentations: 10,
        };
        assert!(params.validate().is_ok());
        for heard in [true, false] {
            let s = run_constant(params, heard);
            let (threshold, _) = s.resolution().unwrap();
            assert!((-LEVEL_LIMIT_DB..=LEVEL_LIMIT_DB).contains(&threshold));
        }
    }

    #[test]
    fn extreme_steps_saturate_instead_of_wrapping() {
        // Unvalidated params still clamp to the floor and ceiling
        let up = StaircaseParams {
            step_up_db: i32::MAX,
            ceiling_db: i32::MAX,
            ..StaircaseParams::default()
        };
        let (s, _) = run(up, &[false]);
        assert_eq!(s.resolution(), Some((i32::MAX, Resolution::Ceiling)));

        let down = StaircaseParams {
            step_down_db: i32::MAX,
            floor_db: i32::MIN,
            ..StaircaseParams::default()
        };
        let (_, steps) = run(down, &[true, true]);
        assert_eq!(
            steps[1],
            StaircaseStep::Continue {
                next_level: i32::MIN
            }
        );
    }

    // --- Initial state ---

    #[test]
    fn starts_descending_at_start_level() {
        let s = Staircase::new(StaircaseParams::default());
        assert_eq!(s.current_level(), 35);
        assert_eq!(s.direction(), Direction::Descending);
        assert_eq!(s.presentation_count(), 0);
        assert!(s.history().is_empty());
        assert!(!s.is_resolved());
    }

    // --- Response handling ---

    #[test]
    fn heard_while_descending_steps_down() {
        let (s, steps) = run(StaircaseParams::default(), &[true]);
        assert_eq!(steps, vec![StaircaseStep::Continue { next_level: 25 }]);
        assert_eq!(s.direction(), Direction::Descending);
    }

    #[test]
    fn missed_steps_up_and_turns_ascending() {
        let (s, steps) = run(StaircaseParams::default(), &[false]);
        assert_eq!(steps, vec![StaircaseStep::Continue { next_level: 40 }]);
        assert_eq!(s.direction(), Direction::Ascending);
    }

    #[test]
    fn heard_while_ascending_is_threshold() {
        let (s, steps) = run(StaircaseParams::default(), &[true, true, false, true]);
        // 35 heard -> 25 heard -> 15 missed -> 20 heard (ascending)
        assert_eq!(
            steps.last(),
            Some(&StaircaseStep::Resolved {
                threshold_db: 20,
                resolution: Resolution::Reversal
            })
        );
        assert_eq!(s.presentation_count(), 4);
        let levels: Vec<i32> = s.history().iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![35, 25, 15, 20]);
    }

    #[test]
    fn history_records_direction_at_presentation() {
        let (s, _) = run(StaircaseParams::default(), &[true, false, true]);
        let dirs: Vec<Direction> = s.history().iter().map(|r| r.direction).collect();
        assert_eq!(
            dirs,
            vec![Direction::Descending, Direction::Descending, Direction::Ascending]
        );
    }

    // --- Floor / ceiling ---

    #[test]
    fn all_heard_terminates_at_floor() {
        let s = run_constant(StaircaseParams::default(), true);
        assert_eq!(s.resolution(), Some((-10, Resolution::Floor)));
        // 35, 25, 15, 5, -5, -10
        assert_eq!(s.presentation_count(), 6);
        let p = StaircaseParams::default();
        let bound = ((p.start_db - p.floor_db) as f64 / p.step_down_db as f64).ceil() as u32 + 1;
        assert!(s.presentation_count() <= bound);
    }

    #[test]
    fn descending_step_is_clamped_to_floor() {
        let (s, steps) = run(StaircaseParams::default(), &[true, true, true, true, true]);
        assert_eq!(steps[4], StaircaseStep::Continue { next_level: -10 });
        assert_eq!(s.current_level(), -10);
    }

    #[test]
    fn all_missed_terminates_at_ceiling() {
        let s = run_constant(StaircaseParams::default(), false);
        assert_eq!(s.resolution(), Some((80, Resolution::Ceiling)));
        let p = StaircaseParams::default();
        let bound = ((p.ceiling_db - p.start_db) as f64 / p.step_up_db as f64).ceil() as u32 + 1;
        assert!(s.presentation_count() <= bound);
        assert_eq!(s.presentation_count(), 9);
    }

    #[test]
    fn start_at_ceiling_missed_resolves_immediately() {
        let params = StaircaseParams {
            start_db: 80,
            ..StaircaseParams::default()
        };
        let (s, _) = run(params, &[false]);
        assert_eq!(s.resolution(), Some((80, Resolution::Ceiling)));
        assert_eq!(s.presentation_count(), 1);
    }

    #[test]
    fn start_at_floor_heard_resolves_immediately() {
        let params = StaircaseParams {
            start_db: -10,
            ..StaircaseParams::default()
        };
        let (s, _) = run(params, &[true]);
        assert_eq!(s.resolution(), Some((-10, Resolution::Floor)));
    }

    // --- Safety cap ---

    #[test]
    fn cap_forces_last_presented_level_without_ascending_heard() {
        let params = StaircaseParams {
            ceiling_db: 120,
            ..StaircaseParams::default()
        };
        let s = run_constant(params, false);
        assert_eq!(s.presentation_count(), 10);
        // 35 + 9 * 5
        assert_eq!(s.resolution(), Some((80, Resolution::SafetyCap)));
    }

    #[test]
    fn cap_with_small_limit_on_descent() {
        let params = StaircaseParams {
            max_presentations: 2,
            ..StaircaseParams::default()
        };
        let (s, steps) = run(params, &[true, true]);
        assert_eq!(
            steps[1],
            StaircaseStep::Resolved {
                threshold_db: 25,
                resolution: Resolution::SafetyCap
            }
        );
        assert_eq!(s.presentation_count(), 2);
    }

    #[test]
    fn natural_resolution_wins_over_cap() {
        let params = StaircaseParams {
            max_presentations: 2,
            ..StaircaseParams::default()
        };
        let (s, _) = run(params, &[false, true]);
        assert_eq!(s.resolution(), Some((40, Resolution::Reversal)));
    }

    #[test]
    fn record_after_resolution_changes_nothing() {
        let (mut s, _) = run(StaircaseParams::default(), &[false, true]);
        let before = s.clone();
        let step = s.record(false);
        assert_eq!(
            step,
            StaircaseStep::Resolved {
                threshold_db: 40,
                resolution: Resolution::Reversal
            }
        );
        assert_eq!(s, before);
    }

    // --- Result ---

    #[test]
    fn to_result_requires_resolution() {
        let s = Staircase::new(StaircaseParams::default());
        assert!(s.to_result(Stimulus::new(1000, Ear::Left)).is_none());
    }

    #[test]
    fn to_result_copies_history() {
        let (s, _) = run(StaircaseParams::default(), &[false, false, true]);
        let result = s.to_result(Stimulus::new(2000, Ear::Right)).unwrap();
        assert_eq!(result.frequency_hz, 2000);
        assert_eq!(result.ear, Ear::Right);
        assert_eq!(result.threshold_db, 45);
        assert_eq!(result.presentations, 3);
        assert_eq!(result.history.len(), 3);
        assert_eq!(result.resolution, Resolution::Reversal);
    }

    #[test]
    fn threshold_result_json_field_names() {
        let (s, _) = run(StaircaseParams::default(), &[false, true]);
        let result = s.to_result(Stimulus::new(500, Ear::Left)).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["frequency"], 500);
        assert_eq!(json["thresholdLevel"], 40);
        assert_eq!(json["ear"], "left");
        assert_eq!(json["resolution"], "reversal");
        assert_eq!(json["history"][0]["direction"], "descending");
    }

    #[test]
    fn threshold_result_without_resolution_field_parses() {
        let json = r#"{"frequency":1000,"ear":"right","thresholdLevel":15,"presentations":3,"history":[]}"#;
        let result: ThresholdResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.threshold_db, 15);
        assert_eq!(result.resolution, Resolution::Reversal);
    }
}
