//! Audiogram pattern detection
//!
//! Each rule is evaluated independently; any number may fire.

use serde::Serialize;

use crate::audio::Ear;
use crate::config::scoring::{
    ASYMMETRY_DELTA_DB, NORMAL_LIMIT_DB, NOTCH_DELTA_DB, SLOPE_DELTA_DB, SYMMETRY_TOLERANCE_DB,
};
use crate::procedure::ThresholdResult;

use super::scoring::{threshold_at, EarSummary};

/// A recognised audiogram shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Pattern {
    /// High frequencies worse than low by more than the slope delta
    SlopingHighFrequency,
    /// Low frequencies worse than high by more than the slope delta
    LowFrequency,
    Asymmetric {
        #[serde(rename = "differenceDb")]
        difference_db: i32,
    },
    /// 4 kHz dip above both 2 kHz and 8 kHz
    NoiseNotch,
    BilateralNormal,
}

impl Pattern {
    pub fn description(&self) -> String {
        match self {
            Pattern::SlopingHighFrequency => "Sloping high-frequency hearing loss, often linked \
                to noise exposure or age-related change"
                .to_string(),
            Pattern::LowFrequency => "Low-frequency hearing loss, a less common pattern that \
                may warrant a medical evaluation"
                .to_string(),
            Pattern::Asymmetric { difference_db } => format!(
                "Asymmetric hearing ({} dB difference between ears); differences over {} dB \
                 should be evaluated",
                difference_db, ASYMMETRY_DELTA_DB
            ),
            Pattern::NoiseNotch => {
                "4 kHz notch, characteristic of noise-induced hearing loss".to_string()
            }
            Pattern::BilateralNormal => {
                "Normal hearing in both ears across the tested frequencies".to_string()
            }
        }
    }
}

/// Inputs shared by all rules
#[derive(Debug, Clone, Copy)]
pub struct PatternInputs<'a> {
    pub results: &'a [ThresholdResult],
    pub left: &'a EarSummary,
    pub right: &'a EarSummary,
    pub overall_pta: Option<i32>,
    pub high_frequency_concern: bool,
    pub asymmetry_db: i32,
}

/// Every pattern that applies, in a fixed order
pub fn detect(inputs: &PatternInputs<'_>) -> Vec<Pattern> {
    let ears = [inputs.left, inputs.right];
    let mut patterns = Vec::new();

    if ears.iter().any(|e| slope(e).is_some_and(|d| d > SLOPE_DELTA_DB)) {
        patterns.push(Pattern::SlopingHighFrequency);
    }
    if ears.iter().any(|e| slope(e).is_some_and(|d| -d > SLOPE_DELTA_DB)) {
        patterns.push(Pattern::LowFrequency);
    }
    if inputs.asymmetry_db > ASYMMETRY_DELTA_DB {
        patterns.push(Pattern::Asymmetric {
            difference_db: inputs.asymmetry_db,
        });
    }
    if Ear::BOTH.iter().any(|&ear| has_notch(inputs.results, ear)) {
        patterns.push(Pattern::NoiseNotch);
    }
    let normal = inputs.overall_pta.is_some_and(|pta| pta <= NORMAL_LIMIT_DB);
    if normal && !inputs.high_frequency_concern && inputs.asymmetry_db <= SYMMETRY_TOLERANCE_DB {
        patterns.push(Pattern::BilateralNormal);
    }
    patterns
}

/// High-frequency average minus low-frequency average
fn slope(summary: &EarSummary) -> Option<i32> {
    Some(summary.high_frequency_pta? - summary.low_frequency_average?)
}

fn has_notch(results: &[ThresholdResult], ear: Ear) -> bool {
    let at = |f| threshold_at(results, ear, f);
    match (at(2000), at(4000), at(8000)) {
        (Some(t2k), Some(t4k), Some(t8k)) => {
            t4k > t2k + NOTCH_DELTA_DB && t4k > t8k + NOTCH_DELTA_DB
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::Resolution;
    use crate::report::scoring::{asymmetry, overall_pta};

    fn results(left: [i32; 5], right: [i32; 5]) -> Vec<ThresholdResult> {
        let mut out = Vec::new();
        for (ear, thresholds) in [(Ear::Left, left), (Ear::Right, right)] {
            for (&f, t) in [500, 1000, 2000, 4000, 8000].iter().zip(thresholds) {
                out.push(ThresholdResult {
                    frequency_hz: f,
                    ear,
                    threshold_db: t,
                    presentations: 1,
                    history: Vec::new(),
                    resolution: Resolution::Reversal,
                });
            }
        }
        out
    }

    fn patterns_for(results: &[ThresholdResult]) -> Vec<Pattern> {
        let left = EarSummary::compute(results, Ear::Left);
        let right = EarSummary::compute(results, Ear::Right);
        detect(&PatternInputs {
            results,
            left: &left,
            right: &right,
            overall_pta: overall_pta(&left, &right),
            high_frequency_concern: left.has_high_frequency_concern()
                || right.has_high_frequency_concern(),
            asymmetry_db: asymmetry(&left, &right),
        })
    }

    #[test]
    fn flat_normal_is_bilateral_normal_only() {
        let r = results([10, 10, 10, 10, 10], [15, 15, 15, 15, 15]);
        assert_eq!(patterns_for(&r), vec![Pattern::BilateralNormal]);
    }

    #[test]
    fn sloping_loss() {
        let r = results([10, 10, 15, 40, 50], [10, 10, 15, 20, 20]);
        let patterns = patterns_for(&r);
        assert!(patterns.contains(&Pattern::SlopingHighFrequency));
        assert!(!patterns.contains(&Pattern::LowFrequency));
        assert!(!patterns.contains(&Pattern::BilateralNormal));
    }

    #[test]
    fn slope_exactly_at_delta_does_not_fire() {
        // low avg 10, high avg 25
        let r = results([10, 10, 10, 25, 25], [10, 10, 10, 10, 10]);
        assert!(!patterns_for(&r).contains(&Pattern::SlopingHighFrequency));
    }

    #[test]
    fn low_frequency_loss() {
        let r = results([50, 45, 30, 20, 20], [10, 10, 10, 10, 10]);
        assert!(patterns_for(&r).contains(&Pattern::LowFrequency));
    }

    #[test]
    fn asymmetry_above_delta() {
        let r = results([10, 10, 10, 10, 10], [30, 30, 30, 30, 30]);
        assert!(patterns_for(&r).contains(&Pattern::Asymmetric { difference_db: 20 }));
    }

    #[test]
    fn asymmetry_between_tolerance_and_delta_blocks_bilateral_normal() {
        let r = results([0, 0, 0, 0, 0], [15, 15, 15, 15, 15]);
        let patterns = patterns_for(&r);
        assert!(patterns.is_empty(), "{:?}", patterns);
    }

    #[test]
    fn noise_notch() {
        let r = results([10, 10, 10, 35, 15], [10, 10, 10, 10, 10]);
        assert!(patterns_for(&r).contains(&Pattern::NoiseNotch));
        let shallow = results([10, 10, 10, 20, 15], [10, 10, 10, 10, 10]);
        assert!(!patterns_for(&shallow).contains(&Pattern::NoiseNotch));
    }

    #[test]
    fn notch_needs_all_three_frequencies() {
        let r: Vec<ThresholdResult> = results([10, 10, 10, 35, 15], [10; 5])
            .into_iter()
            .filter(|r| r.frequency_hz != 8000)
            .collect();
        assert!(!patterns_for(&r).contains(&Pattern::NoiseNotch));
    }

    #[test]
    fn no_data_yields_no_patterns() {
        assert!(patterns_for(&[]).is_empty());
    }

    #[test]
    fn descriptions_mention_difference() {
        let text = Pattern::Asymmetric { difference_db: 20 }.description();
        assert!(text.contains("20 dB"));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_string(&Pattern::Asymmetric { difference_db: 18 }).unwrap();
        assert_eq!(json, r#"{"kind":"asymmetric","differenceDb":18}"#);
    }
}
