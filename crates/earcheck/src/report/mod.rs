//! Scoring and report generation
//!
//! [`Report::generate`] is a pure function of the threshold list, the
//! calibration baseline and the catch-trial record. Identical inputs give
//! identical reports, down to the serialized bytes.

pub mod classify;
pub mod patterns;
pub mod recommendation;
pub mod scoring;

pub use classify::{Classification, OverallStatus, Severity};
pub use patterns::Pattern;
pub use recommendation::Recommendation;
pub use scoring::{EarSummary, Reliability};

use std::collections::BTreeSet;

use serde::Serialize;

use crate::audio::Ear;
use crate::config::stimuli::FREQUENCIES_HZ;
use crate::procedure::{CalibrationBaseline, CatchTrialRecord, TestOutcome, ThresholdResult};

use patterns::PatternInputs;
use recommendation::RecommendationInputs;
use scoring::{asymmetry, overall_pta, threshold_at, worst_threshold};

/// Headline status with its explanation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub status: OverallStatus,
    pub label: &'static str,
    pub description: &'static str,
}

/// Detected pattern with display text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub pattern: Pattern,
    pub description: String,
}

/// Rough frequency region, for the per-frequency table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FrequencyBand {
    Low,
    Mid,
    High,
}

impl FrequencyBand {
    pub fn of(frequency_hz: u32) -> Self {
        match frequency_hz {
            0..=500 => FrequencyBand::Low,
            501..=2000 => FrequencyBand::Mid,
            _ => FrequencyBand::High,
        }
    }
}

/// One column of the audiogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudiogramPoint {
    pub frequency_hz: u32,
    /// Axis label: "500", "1k", "2k"
    pub label: AxisLabel,
    pub band: FrequencyBand,
    pub left: Option<Classification>,
    pub right: Option<Classification>,
}

impl AudiogramPoint {
    pub fn get(&self, ear: Ear) -> Option<Classification> {
        match ear {
            Ear::Left => self.left,
            Ear::Right => self.right,
        }
    }
}

/// Compact audiogram axis label, serialized as a string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisLabel(u32);

impl std::fmt::Display for AxisLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hz = self.0;
        if hz >= 1000 {
            if hz % 1000 == 0 {
                write!(f, "{}k", hz / 1000)
            } else {
                write!(f, "{}k", f64::from(hz) / 1000.0)
            }
        } else {
            write!(f, "{}", hz)
        }
    }
}

impl Serialize for AxisLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Display-ready screening report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub status: StatusSummary,
    pub overall_pta: Option<i32>,
    pub overall_classification: Option<Classification>,
    pub left: EarSummary,
    pub right: EarSummary,
    pub worst_threshold: Option<i32>,
    pub high_frequency_concern: bool,
    pub asymmetry_db: i32,
    pub findings: Vec<Finding>,
    pub audiogram: Vec<AudiogramPoint>,
    /// Present when at least one catch trial was answered
    pub reliability: Option<Reliability>,
    pub calibration_baseline: CalibrationBaseline,
    pub recommendation: Recommendation,
}

impl Report {
    pub fn generate(
        results: &[ThresholdResult],
        calibration_baseline: &CalibrationBaseline,
        catch_trials: &CatchTrialRecord,
    ) -> Self {
        let left = EarSummary::compute(results, Ear::Left);
        let right = EarSummary::compute(results, Ear::Right);
        let overall_pta = overall_pta(&left, &right);
        let high_frequency_concern =
            left.has_high_frequency_concern() || right.has_high_frequency_concern();
        let asymmetry_db = asymmetry(&left, &right);
        let worst_threshold = worst_threshold(results);

        let status = OverallStatus::assess(worst_threshold, high_frequency_concern);
        let findings = patterns::detect(&PatternInputs {
            results,
            left: &left,
            right: &right,
            overall_pta,
            high_frequency_concern,
            asymmetry_db,
        })
        .into_iter()
        .map(|pattern| Finding {
            description: pattern.description(),
            pattern,
        })
        .collect();

        let recommendation = Recommendation::generate(&RecommendationInputs {
            overall_pta,
            high_frequency_concern,
            worst_high_frequency_pta: left.high_frequency_pta.max(right.high_frequency_pta),
            asymmetry_db,
        });

        Self {
            status: StatusSummary {
                status,
                label: status.label(),
                description: status.description(),
            },
            overall_pta,
            overall_classification: overall_pta.map(Classification::of),
            left,
            right,
            worst_threshold,
            high_frequency_concern,
            asymmetry_db,
            findings,
            audiogram: audiogram(results),
            reliability: Reliability::from_record(catch_trials),
            calibration_baseline: *calibration_baseline,
            recommendation,
        }
    }

    /// Report for a completed session
    pub fn from_outcome(outcome: &TestOutcome) -> Self {
        Self::generate(
            &outcome.thresholds(),
            &outcome.calibration_baseline,
            &outcome.catch_trial_record,
        )
    }

    pub fn ear(&self, ear: Ear) -> &EarSummary {
        match ear {
            Ear::Left => &self.left,
            Ear::Right => &self.right,
        }
    }

    pub fn has_pattern(&self, pattern: Pattern) -> bool {
        self.findings.iter().any(|f| f.pattern == pattern)
    }

    /// Calibration line, shown only when both ears were calibrated
    pub fn calibration_note(&self) -> Option<String> {
        let CalibrationBaseline {
            left: Some(left),
            right: Some(right),
        } = self.calibration_baseline
        else {
            return None;
        };
        Some(format!(
            "Your calibration: left ear {} dB HL, right ear {} dB HL",
            left, right
        ))
    }

    /// Serialize for output; deterministic for identical inputs
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Standard frequencies plus any other measured ones, ascending
fn audiogram(results: &[ThresholdResult]) -> Vec<AudiogramPoint> {
    let frequencies: BTreeSet<u32> = FREQUENCIES_HZ
        .iter()
        .copied()
        .chain(results.iter().map(|r| r.frequency_hz))
        .collect();
    frequencies
        .into_iter()
        .map(|frequency_hz| {
            let at = |ear| threshold_at(results, ear, frequency_hz).map(Classification::of);
            AudiogramPoint {
                frequency_hz,
                label: AxisLabel(frequency_hz),
                band: FrequencyBand::of(frequency_hz),
                left: at(Ear::Left),
                right: at(Ear::Right),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::Resolution;

    fn results(left: [i32; 5], right: [i32; 5]) -> Vec<ThresholdResult> {
        let mut out = Vec::new();
        for (ear, thresholds) in [(Ear::Left, left), (Ear::Right, right)] {
            for (&f, t) in FREQUENCIES_HZ.iter().zip(thresholds) {
                out.push(ThresholdResult {
                    frequency_hz: f,
                    ear,
                    threshold_db: t,
                    presentations: 2,
                    history: Vec::new(),
                    resolution: Resolution::Reversal,
                });
            }
        }
        out
    }

    fn baseline() -> CalibrationBaseline {
        CalibrationBaseline {
            left: Some(40),
            right: Some(45),
        }
    }

    // --- Summary ---

    #[test]
    fn normal_listener_report() {
        let r = results([10, 5, 10, 15, 20], [10, 10, 10, 15, 15]);
        let report = Report::generate(&r, &baseline(), &CatchTrialRecord::default());
        assert_eq!(report.status.status, OverallStatus::Excellent);
        assert_eq!(report.overall_pta, Some(9));
        assert_eq!(
            report.overall_classification.map(|c| c.severity),
            Some(Severity::Normal)
        );
        assert!(!report.high_frequency_concern);
        assert!(report.has_pattern(Pattern::BilateralNormal));
        assert_eq!(report.worst_threshold, Some(20));
        assert!(report.reliability.is_none());
    }

    #[test]
    fn high_frequency_loss_report() {
        let r = results([10, 10, 15, 50, 60], [10, 10, 15, 45, 55]);
        let report = Report::generate(&r, &baseline(), &CatchTrialRecord::default());
        assert_eq!(report.status.status, OverallStatus::NeedsAttention);
        assert!(report.high_frequency_concern);
        assert!(report.has_pattern(Pattern::SlopingHighFrequency));
        assert!(!report.has_pattern(Pattern::BilateralNormal));
        assert_eq!(report.ear(Ear::Left).high_frequency_pta, Some(55));
        assert!(report.recommendation.reasons[0].contains("55 dB HL"));
    }

    #[test]
    fn empty_results() {
        let report = Report::generate(
            &[],
            &CalibrationBaseline::default(),
            &CatchTrialRecord::default(),
        );
        assert_eq!(report.overall_pta, None);
        assert!(report.findings.is_empty());
        assert_eq!(report.audiogram.len(), 5);
        assert!(report.audiogram.iter().all(|p| p.left.is_none() && p.right.is_none()));
    }

    // --- Audiogram ---

    #[test]
    fn audiogram_labels_and_bands() {
        let r = results([0, 5, 10, 15, 20], [25, 30, 35, 40, 45]);
        let report = Report::generate(&r, &baseline(), &CatchTrialRecord::default());
        let labels: Vec<String> = report.audiogram.iter().map(|p| p.label.to_string()).collect();
        assert_eq!(labels, vec!["500", "1k", "2k", "4k", "8k"]);
        let bands: Vec<FrequencyBand> = report.audiogram.iter().map(|p| p.band).collect();
        assert_eq!(
            bands,
            vec![
                FrequencyBand::Low,
                FrequencyBand::Mid,
                FrequencyBand::Mid,
                FrequencyBand::High,
                FrequencyBand::High
            ]
        );
        assert_eq!(report.audiogram[3].get(Ear::Right).map(|c| c.db), Some(40));
    }

    #[test]
    fn audiogram_includes_extra_frequencies() {
        let mut r = results([10; 5], [10; 5]);
        r.push(ThresholdResult {
            frequency_hz: 3000,
            ear: Ear::Left,
            threshold_db: 20,
            presentations: 2,
            history: Vec::new(),
            resolution: Resolution::Reversal,
        });
        let report = Report::generate(&r, &baseline(), &CatchTrialRecord::default());
        assert_eq!(report.audiogram.len(), 6);
        assert_eq!(report.audiogram[3].label.to_string(), "3k");
        assert!(report.audiogram[3].right.is_none());
    }

    #[test]
    fn axis_label_serializes_as_string() {
        assert_eq!(serde_json::to_string(&AxisLabel(2500)).unwrap(), r#""2.5k""#);
    }

    // --- Reliability and calibration ---

    #[test]
    fn reliability_shown_with_catch_trials() {
        let r = results([10; 5], [10; 5]);
        let report = Report::generate(
            &r,
            &baseline(),
            &CatchTrialRecord {
                total: 2,
                false_positives: 2,
            },
        );
        let reliability = report.reliability.unwrap();
        assert!(!reliability.reliable);
        assert_eq!(reliability.score_percent, 0);
    }

    #[test]
    fn calibration_note_needs_both_ears() {
        let r = results([10; 5], [10; 5]);
        let report = Report::generate(&r, &baseline(), &CatchTrialRecord::default());
        assert_eq!(
            report.calibration_note().as_deref(),
            Some("Your calibration: left ear 40 dB HL, right ear 45 dB HL")
        );
        let partial = CalibrationBaseline {
            left: Some(40),
            right: None,
        };
        let report = Report::generate(&r, &partial, &CatchTrialRecord::default());
        assert!(report.calibration_note().is_none());
    }

    // --- Determinism ---

    #[test]
    fn identical_inputs_give_identical_json() {
        let r = results([10, 20, 30, 50, 40], [15, 25, 35, 45, 30]);
        let catch = CatchTrialRecord {
            total: 2,
            false_positives: 1,
        };
        let a = Report::generate(&r, &baseline(), &catch).to_json().unwrap();
        let b = Report::generate(&r, &baseline(), &catch).to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn from_outcome_matches_generate() {
        let r = results([10, 20, 30, 50, 40], [15, 25, 35, 45, 30]);
        let catch = CatchTrialRecord {
            total: 1,
            false_positives: 0,
        };
        let outcome = TestOutcome::new(&r, baseline(), catch, 42);
        assert_eq!(
            Report::from_outcome(&outcome),
            Report::generate(&r, &baseline(), &catch)
        );
    }
}
