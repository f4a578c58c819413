//! Quality: how well responses conform to their contracts.

use probe_proto::{Check, Dimension, Insight, Session, ValidationReport};

/// Sub-scores (0-100) above this are listed as strengths.
pub const STRENGTH_THRESHOLD: f64 = 85.0;

/// Sub-scores (0-100) below this are listed as weaknesses.
pub const WEAKNESS_THRESHOLD: f64 = 80.0;

/// Checks that feed the quality score. Timing belongs to performance.
const QUALITY_CHECKS: [Check; 4] = [
    Check::Structural,
    Check::Business,
    Check::Status,
    Check::Headers,
];

fn label(check: Check) -> &'static str {
    match check {
        Check::Structural => "Structural conformance",
        Check::Business => "Business rule compliance",
        Check::Status => "Status code correctness",
        Check::Headers => "Protective header coverage",
        Check::Timing => "Timing",
    }
}

pub(crate) fn analyze(session: &Session) -> Insight {
    let reports: Vec<&ValidationReport> = session
        .suites
        .values()
        .flat_map(|s| s.cases.iter())
        .filter_map(|c| c.validation.as_ref())
        .collect();

    if reports.is_empty() {
        let mut insight = Insight::new(Dimension::Quality, 0.0).with_metric("validated_responses", 0.0);
        insight
            .observations
            .push("no responses were validated".to_string());
        return insight;
    }

    let count = reports.len() as f64;
    let mut sub_scores = Vec::with_capacity(QUALITY_CHECKS.len());
    for check in QUALITY_CHECKS {
        let mean = reports.iter().map(|r| r.scores.get(check)).sum::<f64>() / count;
        sub_scores.push((check, mean * 10.0));
    }

    let score = sub_scores.iter().map(|(_, s)| s).sum::<f64>() / sub_scores.len() as f64;
    let mut insight = Insight::new(Dimension::Quality, score).with_metric("validated_responses", count);

    for (check, value) in &sub_scores {
        insight.metrics.insert(format!("{}_score", check.as_str()), *value);
        if *value > STRENGTH_THRESHOLD {
            insight
                .strengths
                .push(format!("{} ({value:.1})", label(*check)));
        } else if *value < WEAKNESS_THRESHOLD {
            insight
                .weaknesses
                .push(format!("{} ({value:.1})", label(*check)));
        }
    }

    let invalid = reports.iter().filter(|r| !r.is_valid()).count();
    insight
        .metrics
        .insert("invalid_responses".to_string(), invalid as f64);
    if invalid > 0 {
        insight.observations.push(format!(
            "{invalid} of {} responses had validation errors",
            reports.len()
        ));
    }

    insight
}
