//! Outcome of scoring one response against its expectation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five independent checks applied to every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Structural,
    Status,
    Timing,
    Headers,
    Business,
}

impl Check {
    pub const ALL: [Check; 5] = [
        Check::Structural,
        Check::Status,
        Check::Timing,
        Check::Headers,
        Check::Business,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Check::Structural => "structural",
            Check::Status => "status",
            Check::Timing => "timing",
            Check::Headers => "headers",
            Check::Business => "business",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors invalidate a response. Warnings only cost score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    Error,
    Warning,
}

/// A single observation raised by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub check: Check,
    pub severity: FindingSeverity,
    pub message: String,
}

impl Finding {
    pub fn error(check: Check, message: impl Into<String>) -> Self {
        Self {
            check,
            severity: FindingSeverity::Error,
            message: message.into(),
        }
    }

    pub fn warning(check: Check, message: impl Into<String>) -> Self {
        Self {
            check,
            severity: FindingSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == FindingSeverity::Error
    }
}

/// Per-check scores on a 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub structural: f64,
    pub status: f64,
    pub timing: f64,
    pub headers: f64,
    pub business: f64,
}

impl Default for SubScores {
    fn default() -> Self {
        Self {
            structural: 10.0,
            status: 10.0,
            timing: 10.0,
            headers: 10.0,
            business: 10.0,
        }
    }
}

impl SubScores {
    pub fn get(&self, check: Check) -> f64 {
        match check {
            Check::Structural => self.structural,
            Check::Status => self.status,
            Check::Timing => self.timing,
            Check::Headers => self.headers,
            Check::Business => self.business,
        }
    }

    pub fn set(&mut self, check: Check, score: f64) {
        let score = score.clamp(0.0, 10.0);
        match check {
            Check::Structural => self.structural = score,
            Check::Status => self.status = score,
            Check::Timing => self.timing = score,
            Check::Headers => self.headers = score,
            Check::Business => self.business = score,
        }
    }

    /// Unweighted mean of the five sub-scores.
    pub fn mean(&self) -> f64 {
        Check::ALL.iter().map(|c| self.get(*c)).sum::<f64>() / Check::ALL.len() as f64
    }
}

/// Full verdict for one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub scores: SubScores,

    /// Mean of `scores`, 0-10.
    pub overall: f64,

    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn new(scores: SubScores, findings: Vec<Finding>) -> Self {
        Self {
            overall: scores.mean(),
            scores,
            findings,
        }
    }

    /// Valid means zero errors across all checks.
    pub fn is_valid(&self) -> bool {
        !self.findings.iter().any(Finding::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }

    /// Errors joined into a one-line summary.
    pub fn error_summary(&self) -> String {
        self.errors()
            .map(|f| format!("[{}] {}", f.check, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_invalidate() {
        let report = ValidationReport::new(
            SubScores::default(),
            vec![Finding::warning(Check::Headers, "missing x-frame-options")],
        );
        assert!(report.is_valid());
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_single_error_invalidates() {
        let report = ValidationReport::new(
            SubScores::default(),
            vec![
                Finding::warning(Check::Timing, "slow"),
                Finding::error(Check::Status, "500"),
            ],
        );
        assert!(!report.is_valid());
        assert_eq!(report.error_summary(), "[status] 500");
    }

    #[test]
    fn test_mean_and_clamping() {
        let mut scores = SubScores::default();
        scores.set(Check::Timing, 0.0);
        scores.set(Check::Status, 15.0);
        assert_eq!(scores.status, 10.0);
        assert!((scores.mean() - 8.0).abs() < 1e-9);
    }
}
