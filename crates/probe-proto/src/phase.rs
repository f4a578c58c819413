//! Orchestrator phases and run state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a pipeline cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initializing,
    Executing,
    Analyzing,
    Reporting,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 4] = [
        Phase::Initializing,
        Phase::Executing,
        Phase::Analyzing,
        Phase::Reporting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Initializing => "initializing",
            Phase::Executing => "executing",
            Phase::Analyzing => "analyzing",
            Phase::Reporting => "reporting",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a cycle as seen from outside the orchestrator.
///
/// Moves forward only: `initializing -> executing -> analyzing -> reporting`,
/// then one of the two terminal states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Initializing,
    Executing,
    Analyzing,
    Reporting,
    Completed,
    Failed { phase: Phase, message: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Initializing => "initializing",
            RunState::Executing => "executing",
            RunState::Analyzing => "analyzing",
            RunState::Reporting => "reporting",
            RunState::Completed => "completed",
            RunState::Failed { .. } => "failed",
        }
    }
}

impl From<Phase> for RunState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Initializing => RunState::Initializing,
            Phase::Executing => RunState::Executing,
            Phase::Analyzing => RunState::Analyzing,
            Phase::Reporting => RunState::Reporting,
        }
    }
}

/// Which phases of a cycle finished, and which one broke.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseLog {
    /// Phases that ran to completion, in order.
    pub completed: Vec<Phase>,

    /// The phase that failed and why.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<(Phase, String)>,
}

impl PhaseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&mut self, phase: Phase) {
        if !self.completed.contains(&phase) {
            self.completed.push(phase);
        }
    }

    pub fn fail(&mut self, phase: Phase, message: impl Into<String>) {
        self.failed = Some((phase, message.into()));
    }

    pub fn is_complete(&self, phase: Phase) -> bool {
        self.completed.contains(&phase)
    }

    /// Phases that never reached completion.
    pub fn incomplete(&self) -> Vec<Phase> {
        Phase::ALL
            .into_iter()
            .filter(|p| !self.completed.contains(p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_log_tracks_incomplete_phases() {
        let mut log = PhaseLog::new();
        log.complete(Phase::Initializing);
        log.complete(Phase::Executing);
        log.fail(Phase::Analyzing, "boom");

        assert!(log.is_complete(Phase::Executing));
        assert_eq!(log.incomplete(), vec![Phase::Analyzing, Phase::Reporting]);
        assert_eq!(log.failed, Some((Phase::Analyzing, "boom".to_string())));
    }

    #[test]
    fn test_complete_is_idempotent() {
        let mut log = PhaseLog::new();
        log.complete(Phase::Executing);
        log.complete(Phase::Executing);
        assert_eq!(log.completed.len(), 1);
    }

    #[test]
    fn test_run_state_terminal() {
        assert!(RunState::Completed.is_terminal());
        assert!(
            RunState::Failed {
                phase: Phase::Executing,
                message: String::new()
            }
            .is_terminal()
        );
        assert!(!RunState::from(Phase::Analyzing).is_terminal());
    }
}
