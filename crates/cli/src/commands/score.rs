use serde::Serialize;
use stencil_core::{ComplianceLevel, DeviationResult, DeviationScorer, TolerancePreset};

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ScoreReport {
    compliance: ComplianceLevel,
    deviation: DeviationResult,
}

pub fn run(
    standard: &str,
    candidate: &str,
    tolerance: Option<TolerancePreset>,
    json: bool,
) -> CommandResult {
    let tolerance = tolerance.unwrap_or_default();
    let scorer = DeviationScorer::for_preset(tolerance);
    let deviation = scorer.score(standard, candidate);
    let report = ScoreReport { compliance: deviation.compliance(), deviation };

    let output = if json { render_json(&report) } else { render_human(&report, tolerance) };
    CommandResult { exit_code: 0, output }
}

fn render_json(report: &ScoreReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"score\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

fn render_human(report: &ScoreReport, tolerance: TolerancePreset) -> String {
    let deviation = &report.deviation;
    let verdict = if deviation.within_tolerance { "within tolerance" } else { "exceeds tolerance" };
    [
        format!(
            "deviation: {}% (limit {}%, preset {}) - {verdict}",
            deviation.deviation_percentage,
            deviation.tolerance_limit,
            tolerance.label(),
        ),
        format!(
            "tokens: standard {}, candidate {}, shared {}",
            deviation.standard_token_count,
            deviation.candidate_token_count,
            deviation.shared_token_count,
        ),
        format!("compliance: {}: {}", report.compliance.label(), report.compliance.describe()),
    ]
    .join("\n")
}
