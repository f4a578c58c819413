//! Reliability: availability, pass rate, MTBF and the error taxonomy.

use std::collections::BTreeMap;
use std::fmt;

use probe_proto::{CaseStatus, Dimension, Insight, Session, TestCase, TransportError, stats::percentage};
use serde::{Deserialize, Serialize};

/// Fixed error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Timeout,
    Validation,
    Network,
    Other,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 4] = [
        ErrorCategory::Timeout,
        ErrorCategory::Validation,
        ErrorCategory::Network,
        ErrorCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Network => "network",
            ErrorCategory::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a case that did not pass, `None` for passing or unsettled cases.
pub fn categorize(case: &TestCase) -> Option<ErrorCategory> {
    match case.status {
        CaseStatus::Error => Some(match &case.transport_error {
            Some(TransportError::Timeout(_)) => ErrorCategory::Timeout,
            Some(TransportError::Network(_)) => ErrorCategory::Network,
            _ => ErrorCategory::Other,
        }),
        CaseStatus::Failed => {
            let invalid = case.validation.as_ref().is_some_and(|v| !v.is_valid());
            Some(if invalid {
                ErrorCategory::Validation
            } else {
                ErrorCategory::Other
            })
        }
        _ => None,
    }
}

/// Failure counts per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorBreakdown {
    pub counts: BTreeMap<ErrorCategory, usize>,
}

impl ErrorBreakdown {
    pub fn from_session(session: &Session) -> Self {
        let mut counts: BTreeMap<ErrorCategory, usize> =
            ErrorCategory::ALL.iter().map(|c| (*c, 0)).collect();
        for case in session.suites.values().flat_map(|s| s.cases.iter()) {
            if let Some(category) = categorize(case) {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        Self { counts }
    }

    pub fn get(&self, category: ErrorCategory) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Category with the most failures, ties broken by taxonomy order.
    pub fn dominant(&self) -> Option<ErrorCategory> {
        ErrorCategory::ALL
            .into_iter()
            .filter(|c| self.get(*c) > 0)
            .max_by(|a, b| self.get(*a).cmp(&self.get(*b)).then(b.cmp(a)))
    }
}

/// Produces observations about recurring failures.
pub trait PatternDetector: Send + Sync {
    fn observe(&self, session: &Session, breakdown: &ErrorBreakdown) -> Vec<String>;
}

/// Rule-based observations keyed on which categories are non-empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedPatterns;

impl PatternDetector for CannedPatterns {
    fn observe(&self, session: &Session, breakdown: &ErrorBreakdown) -> Vec<String> {
        let mut notes = Vec::new();
        if breakdown.get(ErrorCategory::Timeout) > 0 {
            notes.push(format!(
                "timeouts recur beyond the {} ms budget; check slow upstream dependencies",
                session.environment.timeout_ms
            ));
        }
        if breakdown.get(ErrorCategory::Validation) > 0 {
            notes.push("responses drift from their declared contracts".to_string());
        }
        if breakdown.get(ErrorCategory::Network) > 0 {
            notes.push("intermittent connectivity failures between client and API".to_string());
        }
        if breakdown.get(ErrorCategory::Other) > 0 {
            notes.push("unexpected statuses outside the validation rules".to_string());
        }
        if notes.is_empty() {
            notes.push("no recurring failure pattern detected".to_string());
        }
        notes
    }
}

pub(crate) fn analyze(session: &Session, patterns: &dyn PatternDetector) -> Insight {
    let results = &session.results;
    let executed = results.executed();
    let responded = executed - results.errored;

    let availability = percentage(responded, executed);
    let pass_rate = results.pass_rate;
    let failures = results.failed + results.errored;
    let elapsed_secs = results.elapsed_ms / 1000.0;
    let mtbf_secs = if failures == 0 {
        elapsed_secs
    } else {
        elapsed_secs / failures as f64
    };

    let breakdown = ErrorBreakdown::from_session(session);
    let score = if executed == 0 {
        0.0
    } else {
        (availability + pass_rate) / 2.0
    };

    let mut insight = Insight::new(Dimension::Reliability, score)
        .with_metric("availability", availability)
        .with_metric("pass_rate", pass_rate)
        .with_metric("mtbf_secs", mtbf_secs)
        .with_metric("failures", failures as f64);
    for category in ErrorCategory::ALL {
        insight.metrics.insert(
            format!("{}_errors", category.as_str()),
            breakdown.get(category) as f64,
        );
    }

    let load: Vec<_> = session
        .suites
        .values()
        .filter_map(|s| s.load_result.as_ref())
        .collect();
    if !load.is_empty() {
        let failed: usize = load.iter().map(|l| l.failed).sum();
        let settled: usize = load.iter().map(|l| l.settled()).sum();
        let load_error_rate = percentage(failed, settled);
        insight
            .metrics
            .insert("load_error_rate".to_string(), load_error_rate);
        if load_error_rate > 5.0 {
            insight
                .weaknesses
                .push(format!("{load_error_rate:.1}% of calls failed under load"));
        }
    }

    if executed > 0 && availability >= 99.9 {
        insight
            .strengths
            .push("Every request received a response".to_string());
    } else if availability < 95.0 {
        insight
            .weaknesses
            .push(format!("Availability of {availability:.1}%"));
    }
    if pass_rate >= 95.0 {
        insight
            .strengths
            .push(format!("Pass rate of {pass_rate:.1}%"));
    } else if pass_rate < 90.0 {
        insight
            .weaknesses
            .push(format!("Pass rate of {pass_rate:.1}%"));
    }
    if let Some(dominant) = breakdown.dominant() {
        insight.observations.push(format!(
            "most failures are {dominant} ({} of {})",
            breakdown.get(dominant),
            breakdown.total()
        ));
    }

    insight.observations.extend(patterns.observe(session, &breakdown));
    insight
}
