//! Product recommendation
//!
//! Reasons and features are chosen from the measured thresholds; the
//! product's standard features always follow.

use serde::Serialize;

use crate::config::report::PRODUCT_NAME;
use crate::config::scoring::{NORMAL_LIMIT_DB, SYMMETRY_TOLERANCE_DB};

use super::classify::Severity;

const STANDARD_FEATURES: [&str; 3] = [
    "Rechargeable battery, no small batteries to replace",
    "Discreet, comfortable behind-the-ear design",
    "Clinical-grade sound processing",
];

/// Facts the recommendation is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendationInputs {
    pub overall_pta: Option<i32>,
    pub high_frequency_concern: bool,
    /// Worst of the two ears' high-frequency PTAs
    pub worst_high_frequency_pta: Option<i32>,
    pub asymmetry_db: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub product: &'static str,
    pub reasons: Vec<String>,
    pub features: Vec<String>,
}

impl Recommendation {
    pub fn generate(inputs: &RecommendationInputs) -> Self {
        let mut reasons = Vec::new();
        let mut features = Vec::new();

        if inputs.high_frequency_concern {
            reasons.push(format!(
                "Your high-frequency thresholds average {} dB HL, which affects speech \
                 clarity, especially consonants like \"s\", \"f\" and \"th\".",
                inputs.worst_high_frequency_pta.unwrap_or(0)
            ));
            features.push("Restores the high-frequency sounds speech depends on".to_string());
        }

        if let Some(pta) = inputs.overall_pta.filter(|p| (26..=55).contains(p)) {
            reasons.push(format!(
                "Your PTA of {} dB HL indicates {} hearing loss, which responds well to \
                 amplification.",
                pta,
                Severity::classify(pta).label().to_lowercase()
            ));
            features.push("Tuned to your measured level of hearing loss".to_string());
        }

        if inputs.asymmetry_db > SYMMETRY_TOLERANCE_DB {
            reasons.push(format!(
                "Your ears differ by {} dB and need to be adjusted independently.",
                inputs.asymmetry_db
            ));
            features.push("Independent tuning for each ear".to_string());
        }

        let normal = inputs.overall_pta.unwrap_or(0) <= NORMAL_LIMIT_DB;
        if normal && !inputs.high_frequency_concern {
            reasons.push(format!(
                "Your hearing is currently normal. The {} can still help in noisy places \
                 like restaurants or meetings.",
                PRODUCT_NAME
            ));
            features.push("Clearer speech in noisy environments".to_string());
        }

        features.extend(STANDARD_FEATURES.iter().map(|f| f.to_string()));

        Self {
            product: PRODUCT_NAME,
            reasons,
            features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> RecommendationInputs {
        RecommendationInputs {
            overall_pta: Some(10),
            high_frequency_concern: false,
            worst_high_frequency_pta: Some(10),
            asymmetry_db: 0,
        }
    }

    #[test]
    fn normal_hearing_gets_noisy_environment_reason() {
        let rec = Recommendation::generate(&inputs());
        assert_eq!(rec.product, "Nova");
        assert_eq!(rec.reasons.len(), 1);
        assert!(rec.reasons[0].contains("currently normal"));
        assert_eq!(rec.features.len(), 4);
    }

    #[test]
    fn high_frequency_concern_quotes_worst_average() {
        let rec = Recommendation::generate(&RecommendationInputs {
            high_frequency_concern: true,
            worst_high_frequency_pta: Some(45),
            ..inputs()
        });
        assert!(rec.reasons[0].contains("45 dB HL"));
        assert!(!rec.reasons.iter().any(|r| r.contains("currently normal")));
    }

    #[test]
    fn mild_to_moderate_pta_names_severity() {
        let rec = Recommendation::generate(&RecommendationInputs {
            overall_pta: Some(48),
            ..inputs()
        });
        assert!(rec.reasons.iter().any(|r| r.contains("48 dB HL indicates moderate")));
    }

    #[test]
    fn pta_outside_range_has_no_severity_reason() {
        let rec = Recommendation::generate(&RecommendationInputs {
            overall_pta: Some(60),
            ..inputs()
        });
        assert!(rec.reasons.is_empty());
        assert_eq!(rec.features, STANDARD_FEATURES.map(String::from).to_vec());
    }

    #[test]
    fn asymmetry_over_tolerance() {
        let rec = Recommendation::generate(&RecommendationInputs {
            asymmetry_db: 12,
            ..inputs()
        });
        assert!(rec.reasons.iter().any(|r| r.contains("differ by 12 dB")));
        let rec = Recommendation::generate(&RecommendationInputs {
            asymmetry_db: 10,
            ..inputs()
        });
        assert!(!rec.reasons.iter().any(|r| r.contains("differ by")));
    }

    #[test]
    fn standard_features_always_last() {
        let rec = Recommendation::generate(&RecommendationInputs {
            overall_pta: Some(30),
            high_frequency_concern: true,
            worst_high_frequency_pta: Some(40),
            asymmetry_db: 20,
        });
        assert_eq!(rec.reasons.len(), 3);
        assert_eq!(&rec.features[3..], &STANDARD_FEATURES.map(String::from)[..]);
    }
}
