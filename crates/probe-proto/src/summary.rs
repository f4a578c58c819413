//! Final summary of one orchestrator cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::analysis::RiskLevel;
use crate::grade::Grade;
use crate::phase::{PhaseLog, RunState};
use crate::session::SessionStatus;

/// Assembled when a cycle reaches `completed` or `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// One-based cycle number within the run.
    pub cycle: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    pub environment: String,
    pub state: RunState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_status: Option<SessionStatus>,

    pub pass_rate: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,

    pub critical_issues: usize,

    /// Report and monitoring files written for this cycle.
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,

    pub phases: PhaseLog,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// True when every phase completed and the session passed outright.
    pub fn is_clean(&self) -> bool {
        self.state == RunState::Completed && self.session_status == Some(SessionStatus::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, RunState::Failed { .. })
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
