//! Error taxonomy shared by every Probe layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::case::CaseStatus;
use crate::phase::Phase;

/// Failure to complete an HTTP exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransportError {
    /// No response arrived within the environment timeout.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Connection refused, reset, DNS failure and friends.
    #[error("network error: {0}")]
    Network(String),

    /// The request could not be built (bad URL, bad header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Returns true for timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// Classes of failure, each with a fixed propagation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Expectation mismatch. The case ends `failed`.
    AssertionFailure,
    /// Network or timeout. The case ends `error`.
    Transport,
    /// Malformed run configuration. Fails before any execution.
    Validation,
    /// Suite could not be set up. Recorded as a critical issue, the run goes on.
    SuiteSetup,
    /// Fatal to the current orchestrator phase.
    Phase,
}

impl ErrorKind {
    /// Terminal case status this kind of error produces, if it is case-scoped.
    pub fn case_status(self) -> Option<CaseStatus> {
        match self {
            ErrorKind::AssertionFailure => Some(CaseStatus::Failed),
            ErrorKind::Transport => Some(CaseStatus::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::AssertionFailure => "assertion_failure",
            ErrorKind::Transport => "transport_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::SuiteSetup => "suite_setup_error",
            ErrorKind::Phase => "phase_error",
        }
    }
}

/// Top-level error type carrying the taxonomy.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProbeError {
    #[error("assertion failed for {case_id}: {message}")]
    AssertionFailure { case_id: String, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("suite '{suite}' setup failed: {message}")]
    SuiteSetup { suite: String, message: String },

    #[error("{phase} phase failed: {message}")]
    Phase { phase: Phase, message: String },
}

impl ProbeError {
    /// Returns the taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::AssertionFailure { .. } => ErrorKind::AssertionFailure,
            ProbeError::Transport(_) => ErrorKind::Transport,
            ProbeError::Validation(_) => ErrorKind::Validation,
            ProbeError::SuiteSetup { .. } => ErrorKind::SuiteSetup,
            ProbeError::Phase { .. } => ErrorKind::Phase,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ProbeError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_scoped_kinds_map_to_status() {
        assert_eq!(
            ErrorKind::AssertionFailure.case_status(),
            Some(CaseStatus::Failed)
        );
        assert_eq!(ErrorKind::Transport.case_status(), Some(CaseStatus::Error));
        assert_eq!(ErrorKind::SuiteSetup.case_status(), None);
        assert_eq!(ErrorKind::Phase.case_status(), None);
    }

    #[test]
    fn test_transport_converts_into_probe_error() {
        let err: ProbeError = TransportError::Timeout(500).into();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "request timed out after 500 ms");
    }

    #[test]
    fn test_phase_error_message() {
        let err = ProbeError::Phase {
            phase: Phase::Reporting,
            message: "disk full".into(),
        };
        assert_eq!(err.to_string(), "reporting phase failed: disk full");
    }

    #[test]
    fn test_transport_error_serializes_tagged() {
        let json = serde_json::to_string(&TransportError::Network("refused".into())).unwrap();
        assert_eq!(json, r#"{"kind":"network","detail":"refused"}"#);
    }
}
