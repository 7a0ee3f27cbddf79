//! Threshold averages
//!
//! Every average is the arithmetic mean of the available thresholds,
//! rounded half up to a whole dB. Missing frequencies are skipped; an
//! average over no data is `None`.

use serde::Serialize;

use crate::audio::Ear;
use crate::config::scoring::{
    HIGH_FREQUENCIES_HZ, LOW_FREQUENCIES_HZ, NORMAL_LIMIT_DB, PTA_FREQUENCIES_HZ,
};
use crate::procedure::{CatchTrialRecord, ThresholdResult};

use super::classify::Classification;

/// Round to the nearest integer, halves toward positive infinity
pub fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Rounded mean, `None` when empty
pub fn mean_rounded(values: &[i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().map(|&v| i64::from(v)).sum();
    Some(round_half_up(sum as f64 / values.len() as f64))
}

/// Threshold measured for `ear` at `frequency_hz`
pub fn threshold_at(results: &[ThresholdResult], ear: Ear, frequency_hz: u32) -> Option<i32> {
    results
        .iter()
        .find(|r| r.ear == ear && r.frequency_hz == frequency_hz)
        .map(|r| r.threshold_db)
}

/// Rounded mean of the thresholds at `frequencies`
pub fn band_average(results: &[ThresholdResult], ear: Ear, frequencies: &[u32]) -> Option<i32> {
    let values: Vec<i32> = frequencies
        .iter()
        .filter_map(|&f| threshold_at(results, ear, f))
        .collect();
    mean_rounded(&values)
}

/// Averages for one ear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarSummary {
    pub ear: Ear,
    /// Pure-tone average over 500/1000/2000 Hz
    pub pta: Option<i32>,
    /// Average over 4000/8000 Hz
    pub high_frequency_pta: Option<i32>,
    /// Average over 500/1000 Hz, the reference for slope detection
    pub low_frequency_average: Option<i32>,
    pub pta_classification: Option<Classification>,
    pub high_frequency_classification: Option<Classification>,
}

impl EarSummary {
    pub fn compute(results: &[ThresholdResult], ear: Ear) -> Self {
        let pta = band_average(results, ear, &PTA_FREQUENCIES_HZ);
        let high_frequency_pta = band_average(results, ear, &HIGH_FREQUENCIES_HZ);
        Self {
            ear,
            pta,
            high_frequency_pta,
            low_frequency_average: band_average(results, ear, &LOW_FREQUENCIES_HZ),
            pta_classification: pta.map(Classification::of),
            high_frequency_classification: high_frequency_pta.map(Classification::of),
        }
    }

    /// High-frequency PTA above the normal limit
    pub fn has_high_frequency_concern(&self) -> bool {
        self.high_frequency_pta.is_some_and(|v| v > NORMAL_LIMIT_DB)
    }
}

/// Mean of both ear PTAs, or whichever exists
pub fn overall_pta(left: &EarSummary, right: &EarSummary) -> Option<i32> {
    match (left.pta, right.pta) {
        (Some(l), Some(r)) => mean_rounded(&[l, r]),
        (l, r) => l.or(r),
    }
}

/// |left PTA - right PTA|, 0 unless both ears have a PTA
pub fn asymmetry(left: &EarSummary, right: &EarSummary) -> i32 {
    match (left.pta, right.pta) {
        (Some(l), Some(r)) => (l - r).abs(),
        _ => 0,
    }
}

/// Highest threshold across all results
pub fn worst_threshold(results: &[ThresholdResult]) -> Option<i32> {
    results.iter().map(|r| r.threshold_db).max()
}

/// Catch-trial reliability, flattened for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reliability {
    pub total: u32,
    pub false_positives: u32,
    pub false_positive_rate: f64,
    pub reliable: bool,
    /// `round((1 - false_positive_rate) * 100)`
    pub score_percent: u8,
}

impl Reliability {
    /// `None` when no catch trial was answered
    pub fn from_record(record: &CatchTrialRecord) -> Option<Self> {
        if record.total == 0 {
            return None;
        }
        let rate = record.false_positive_rate();
        Some(Self {
            total: record.total,
            false_positives: record.false_positives,
            false_positive_rate: rate,
            reliable: record.is_reliable(),
            score_percent: round_half_up((1.0 - rate) * 100.0).clamp(0, 100) as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(ear: Ear, frequency_hz: u32, threshold_db: i32) -> ThresholdResult {
        ThresholdResult {
            frequency_hz,
            ear,
            threshold_db,
            presentations: 1,
            history: Vec::new(),
            resolution: crate::procedure::Resolution::Reversal,
        }
    }

    fn ear(ear_side: Ear, thresholds: [i32; 5]) -> Vec<ThresholdResult> {
        [500, 1000, 2000, 4000, 8000]
            .iter()
            .zip(thresholds)
            .map(|(&f, t)| result(ear_side, f, t))
            .collect()
    }

    // --- Rounding ---

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.4), 2);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-2.6), -3);
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(mean_rounded(&[]), None);
        assert_eq!(mean_rounded(&[10, 15]), Some(13));
        assert_eq!(mean_rounded(&[-10, -5]), Some(-7));
    }

    // --- Ear summaries ---

    #[test]
    fn ear_summary_averages() {
        let results = ear(Ear::Left, [10, 20, 25, 40, 55]);
        let summary = EarSummary::compute(&results, Ear::Left);
        assert_eq!(summary.pta, Some(18));
        assert_eq!(summary.high_frequency_pta, Some(48));
        assert_eq!(summary.low_frequency_average, Some(15));
        assert!(summary.has_high_frequency_concern());
        assert_eq!(summary.pta_classification.map(|c| c.label), Some("Normal"));
        assert_eq!(
            summary.high_frequency_classification.map(|c| c.label),
            Some("Moderate")
        );
    }

    #[test]
    fn ear_summary_skips_missing_frequencies() {
        let results = vec![result(Ear::Right, 1000, 30), result(Ear::Right, 2000, 45)];
        let summary = EarSummary::compute(&results, Ear::Right);
        assert_eq!(summary.pta, Some(38));
        assert_eq!(summary.high_frequency_pta, None);
        assert!(!summary.has_high_frequency_concern());
        assert_eq!(EarSummary::compute(&results, Ear::Left).pta, None);
    }

    // --- Cross-ear ---

    #[test]
    fn overall_pta_and_asymmetry() {
        let mut results = ear(Ear::Left, [10, 10, 10, 10, 10]);
        results.extend(ear(Ear::Right, [35, 35, 35, 35, 35]));
        let left = EarSummary::compute(&results, Ear::Left);
        let right = EarSummary::compute(&results, Ear::Right);
        assert_eq!(overall_pta(&left, &right), Some(23));
        assert_eq!(asymmetry(&left, &right), 25);
        assert_eq!(worst_threshold(&results), Some(35));
    }

    #[test]
    fn overall_pta_with_one_ear() {
        let results = ear(Ear::Right, [30, 30, 30, 30, 30]);
        let left = EarSummary::compute(&results, Ear::Left);
        let right = EarSummary::compute(&results, Ear::Right);
        assert_eq!(overall_pta(&left, &right), Some(30));
        assert_eq!(asymmetry(&left, &right), 0);
    }

    #[test]
    fn nothing_measured() {
        let left = EarSummary::compute(&[], Ear::Left);
        let right = EarSummary::compute(&[], Ear::Right);
        assert_eq!(overall_pta(&left, &right), None);
        assert_eq!(worst_threshold(&[]), None);
    }

    // --- Reliability ---

    #[test]
    fn reliability_absent_without_catch_trials() {
        assert!(Reliability::from_record(&CatchTrialRecord::default()).is_none());
    }

    #[test]
    fn reliability_score() {
        let r = Reliability::from_record(&CatchTrialRecord {
            total: 2,
            false_positives: 1,
        })
        .unwrap();
        assert_eq!(r.false_positive_rate, 0.5);
        assert!(r.reliable);
        assert_eq!(r.score_percent, 50);

        let r = Reliability::from_record(&CatchTrialRecord {
            total: 3,
            false_positives: 2,
        })
        .unwrap();
        assert!(!r.reliable);
        assert_eq!(r.score_percent, 33);
    }
}
