//! Plain-text rendering of a report

use earcheck::audio::Ear;
use earcheck::report::{AudiogramPoint, Report};

fn cell(point: &AudiogramPoint, ear: Ear) -> String {
    match point.get(ear) {
        Some(c) => format!("{:>4} {:<17}", c.db, c.label),
        None => format!("{:>4} {:<17}", "--", ""),
    }
}

fn pta(value: Option<i32>) -> String {
    value
        .map(|v| format!("{} dB HL", v))
        .unwrap_or_else(|| "--".to_string())
}

/// Report as printable lines, summary first
pub fn report_lines(report: &Report) -> Vec<String> {
    let mut lines = vec![
        format!("Overall: {}", report.status.label),
        format!("  {}", report.status.description),
        String::new(),
    ];

    match report.overall_classification {
        Some(c) => lines.push(format!(
            "Pure-tone average: {} dB HL ({}, {})",
            c.db, c.label, c.range
        )),
        None => lines.push("Pure-tone average: --".to_string()),
    }
    for ear in Ear::BOTH {
        let summary = report.ear(ear);
        lines.push(format!(
            "  {:<5} PTA {:>9}   high-frequency {:>9}",
            ear.to_string(),
            pta(summary.pta),
            pta(summary.high_frequency_pta)
        ));
    }
    if report.asymmetry_db > 0 {
        lines.push(format!("  Difference between ears: {} dB", report.asymmetry_db));
    }

    lines.push(String::new());
    lines.push(format!("{:>6}  {:<22}  {:<22}", "Hz", "Left", "Right"));
    for point in &report.audiogram {
        lines.push(format!(
            "{:>6}  {}  {}",
            point.label.to_string(),
            cell(point, Ear::Left),
            cell(point, Ear::Right)
        ));
    }

    if !report.findings.is_empty() {
        lines.push(String::new());
        lines.push("Findings:".to_string());
        for finding in &report.findings {
            lines.push(format!("  - {}", finding.description));
        }
    }

    lines.push(String::new());
    match &report.reliability {
        Some(r) => lines.push(format!(
            "Reliability: {}% ({} of {} silent checks answered \"heard\"){}",
            r.score_percent,
            r.false_positives,
            r.total,
            if r.reliable { "" } else { ", results may be unreliable" }
        )),
        None => lines.push("Reliability: no silent checks were run".to_string()),
    }
    if let Some(note) = report.calibration_note() {
        lines.push(note);
    }

    lines.push(String::new());
    lines.push(format!("Recommended: {}", report.recommendation.product));
    for reason in &report.recommendation.reasons {
        lines.push(format!("  * {}", reason));
    }
    for feature in &report.recommendation.features {
        lines.push(format!("  + {}", feature));
    }
    lines
}
