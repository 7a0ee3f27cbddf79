//! Severity bands and overall status

use std::fmt;

use serde::Serialize;

/// WHO-style hearing loss grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Normal,
    Mild,
    Moderate,
    ModeratelySevere,
    Severe,
    Profound,
}

impl Severity {
    /// Grade a dB HL value
    pub fn classify(db: i32) -> Self {
        match db {
            i32::MIN..=25 => Severity::Normal,
            26..=40 => Severity::Mild,
            41..=55 => Severity::Moderate,
            56..=70 => Severity::ModeratelySevere,
            71..=90 => Severity::Severe,
            _ => Severity::Profound,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Normal => "Normal",
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::ModeratelySevere => "Moderately Severe",
            Severity::Severe => "Severe",
            Severity::Profound => "Profound",
        }
    }

    /// Band limits as display text
    pub fn range(self) -> &'static str {
        match self {
            Severity::Normal => "0-25 dB HL",
            Severity::Mild => "26-40 dB HL",
            Severity::Moderate => "41-55 dB HL",
            Severity::ModeratelySevere => "56-70 dB HL",
            Severity::Severe => "71-90 dB HL",
            Severity::Profound => "91+ dB HL",
        }
    }

    pub fn is_normal(self) -> bool {
        self == Severity::Normal
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A graded value, flattened for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub db: i32,
    pub severity: Severity,
    pub label: &'static str,
    pub range: &'static str,
}

impl Classification {
    pub fn of(db: i32) -> Self {
        let severity = Severity::classify(db);
        Self {
            db,
            severity,
            label: severity.label(),
            range: severity.range(),
        }
    }
}

/// Headline verdict, driven by the worst single threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverallStatus {
    Excellent,
    GoodWithHighFrequencyConcern,
    MildLoss,
    Fair,
    NeedsAttention,
}

impl OverallStatus {
    pub fn assess(worst_threshold: Option<i32>, high_frequency_concern: bool) -> Self {
        match worst_threshold.unwrap_or(0) {
            w if w > 55 => OverallStatus::NeedsAttention,
            w if w > 40 => OverallStatus::Fair,
            w if w > 25 => OverallStatus::MildLoss,
            _ if high_frequency_concern => OverallStatus::GoodWithHighFrequencyConcern,
            _ => OverallStatus::Excellent,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OverallStatus::Excellent => "Excellent",
            OverallStatus::GoodWithHighFrequencyConcern => "Good (HF concern)",
            OverallStatus::MildLoss => "Mild Loss",
            OverallStatus::Fair => "Fair",
            OverallStatus::NeedsAttention => "Needs Attention",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OverallStatus::Excellent => {
                "Thresholds are within the normal range at every tested frequency."
            }
            OverallStatus::GoodWithHighFrequencyConcern => {
                "Hearing is mostly normal, with some change at high frequencies."
            }
            OverallStatus::MildLoss => {
                "Mild hearing loss detected. Keep an eye on it and consider an evaluation."
            }
            OverallStatus::Fair => "Moderate hearing loss detected at some frequencies.",
            OverallStatus::NeedsAttention => {
                "Significant hearing loss detected. A professional evaluation is recommended."
            }
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
