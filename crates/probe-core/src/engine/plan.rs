//! Execution plan: which suites run, in what order.

use std::collections::HashSet;

use probe_proto::{Suite, SuitePriority};

use super::EngineError;

/// One suite slot in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Position in the declared suite list.
    pub declared_index: usize,
    pub name: String,
    pub priority: SuitePriority,
    pub cases: usize,
    pub skipped_cases: usize,
    pub load_requests: usize,
}

/// Suites ordered high -> medium -> low, ties kept in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub entries: Vec<PlanEntry>,
}

impl ExecutionPlan {
    /// Builds the plan. Duplicate suite names are rejected.
    pub fn build(suites: &[Suite]) -> Result<Self, EngineError> {
        let mut seen = HashSet::new();
        for suite in suites {
            if !seen.insert(suite.name.as_str()) {
                return Err(EngineError::InvalidPlan(format!(
                    "duplicate suite name '{}'",
                    suite.name
                )));
            }
        }

        let mut entries: Vec<PlanEntry> = suites
            .iter()
            .enumerate()
            .map(|(declared_index, suite)| PlanEntry {
                declared_index,
                name: suite.name.clone(),
                priority: suite.priority,
                cases: suite.cases.len(),
                skipped_cases: suite.cases.iter().filter(|c| c.skip).count(),
                load_requests: suite.load.as_ref().map_or(0, |l| l.total_requests()),
            })
            .collect();

        // Stable sort keeps declaration order within a priority.
        entries.sort_by_key(|entry| entry.priority);

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_cases(&self) -> usize {
        self.entries.iter().map(|e| e.cases).sum()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}
