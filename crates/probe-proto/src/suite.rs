//! Suites: named, ordered groups of test cases with aggregated metrics.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::case::{CaseStatus, HttpMethod, TestCase};
use crate::stats::{LatencyStats, percentage};

/// Scheduling priority. Plans run high before medium before low.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SuitePriority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for SuitePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SuitePriority::High => "high",
            SuitePriority::Medium => "medium",
            SuitePriority::Low => "low",
        })
    }
}

fn default_load_statuses() -> Vec<u16> {
    vec![200]
}

/// Concurrent burst run after the suite's sequential cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadProfile {
    pub concurrent_users: u32,
    pub requests_per_user: u32,

    #[serde(default)]
    pub method: HttpMethod,

    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Statuses counted as a successful call.
    #[serde(default = "default_load_statuses")]
    pub statuses: Vec<u16>,

    /// Pass every dispatch through the rate gate instead of firing at once.
    #[serde(default)]
    pub paced: bool,
}

impl LoadProfile {
    pub fn new(endpoint: impl Into<String>, concurrent_users: u32, requests_per_user: u32) -> Self {
        Self {
            concurrent_users,
            requests_per_user,
            method: HttpMethod::Get,
            endpoint: endpoint.into(),
            body: None,
            statuses: default_load_statuses(),
            paced: false,
        }
    }

    /// Number of calls the burst dispatches.
    pub fn total_requests(&self) -> usize {
        self.concurrent_users as usize * self.requests_per_user as usize
    }
}

/// Outcome of a load burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: f64,

    /// Settled calls (success and failure) per wall-clock second.
    pub requests_per_second: f64,

    pub latency: LatencyStats,

    /// In-flight cap applied, `None` when uncapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_cap: Option<usize>,
}

impl LoadResult {
    pub fn settled(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn error_rate(&self) -> f64 {
        percentage(self.failed, self.settled())
    }
}

/// Aggregates recomputed from a suite's cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteMetrics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,

    /// Case count per `METHOD endpoint`.
    pub endpoints: BTreeMap<String, usize>,

    pub latency: LatencyStats,

    /// (failed + error) / executed, in percent.
    pub error_rate: f64,

    /// passed / executed, in percent.
    pub pass_rate: f64,
}

impl SuiteMetrics {
    /// Recomputes metrics from scratch. Independent of case order.
    pub fn from_cases(cases: &[TestCase]) -> Self {
        let mut metrics = SuiteMetrics {
            total: cases.len(),
            ..Self::default()
        };

        let mut samples = Vec::new();
        for case in cases {
            match case.status {
                CaseStatus::Passed => metrics.passed += 1,
                CaseStatus::Failed => metrics.failed += 1,
                CaseStatus::Error => metrics.errored += 1,
                CaseStatus::Skipped => metrics.skipped += 1,
                CaseStatus::Pending | CaseStatus::Running => {}
            }
            *metrics.endpoints.entry(case.route()).or_insert(0) += 1;
            if let Some(response) = &case.response {
                samples.push(response.elapsed_ms);
            }
        }

        metrics.latency = LatencyStats::from_samples(&samples);
        let executed = metrics.executed();
        metrics.error_rate = percentage(metrics.failed + metrics.errored, executed);
        metrics.pass_rate = percentage(metrics.passed, executed);
        metrics
    }

    /// Settled cases that were actually dispatched.
    pub fn executed(&self) -> usize {
        self.passed + self.failed + self.errored
    }
}

/// A named ordered collection of cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub priority: SuitePriority,

    #[serde(default)]
    pub cases: Vec<TestCase>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadProfile>,

    #[serde(default)]
    pub metrics: SuiteMetrics,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_result: Option<LoadResult>,

    /// Set when the suite could not be set up or run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,

    /// True once every case has settled and metrics are final.
    #[serde(default)]
    pub finalized: bool,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            priority: SuitePriority::Medium,
            cases: Vec::new(),
            load: None,
            metrics: SuiteMetrics::default(),
            load_result: None,
            setup_error: None,
            finalized: false,
        }
    }

    pub fn with_priority(mut self, priority: SuitePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn with_cases(mut self, cases: impl IntoIterator<Item = TestCase>) -> Self {
        self.cases.extend(cases);
        self
    }

    pub fn with_load(mut self, load: LoadProfile) -> Self {
        self.load = Some(load);
        self
    }

    pub fn refresh_metrics(&mut self) {
        self.metrics = SuiteMetrics::from_cases(&self.cases);
    }

    /// Recomputes metrics and freezes the suite.
    pub fn finalize(&mut self) {
        self.refresh_metrics();
        self.finalized = true;
    }

    /// Clears outcomes so the definition can run again.
    pub fn reset(&mut self) {
        for case in &mut self.cases {
            case.reset();
        }
        self.metrics = SuiteMetrics::default();
        self.load_result = None;
        self.setup_error = None;
        self.finalized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::CapturedResponse;

    fn settled(id: &str, status: CaseStatus, elapsed: f64) -> TestCase {
        let mut case = TestCase::get(id, format!("/{id}"));
        case.status = status;
        case.response = Some(CapturedResponse::new(200, Value::Null, elapsed));
        case
    }

    #[test]
    fn test_priority_ordering() {
        let mut priorities = vec![SuitePriority::Low, SuitePriority::High, SuitePriority::Medium];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![SuitePriority::High, SuitePriority::Medium, SuitePriority::Low]
        );
    }

    #[test]
    fn test_metrics_error_rate() {
        let mut cases: Vec<TestCase> = (0..8)
            .map(|i| settled(&format!("ok{i}"), CaseStatus::Passed, 50.0))
            .collect();
        cases.push(settled("bad1", CaseStatus::Failed, 80.0));
        cases.push(settled("bad2", CaseStatus::Failed, 90.0));

        let metrics = SuiteMetrics::from_cases(&cases);
        assert_eq!(metrics.total, 10);
        assert_eq!(metrics.error_rate, 20.0);
        assert_eq!(metrics.pass_rate, 80.0);
        assert_eq!(metrics.latency.max_ms, 90.0);
    }

    #[test]
    fn test_metrics_ignore_skipped_in_rates() {
        let mut skipped = TestCase::get("s", "/s").skipped();
        skipped.status = CaseStatus::Skipped;
        let cases = vec![settled("a", CaseStatus::Passed, 10.0), skipped];

        let metrics = SuiteMetrics::from_cases(&cases);
        assert_eq!(metrics.skipped, 1);
        assert_eq!(metrics.executed(), 1);
        assert_eq!(metrics.pass_rate, 100.0);
    }

    #[test]
    fn test_metrics_order_independent() {
        let cases = vec![
            settled("a", CaseStatus::Passed, 12.3),
            settled("b", CaseStatus::Error, 0.7),
            settled("c", CaseStatus::Failed, 401.9),
            settled("d", CaseStatus::Passed, 3.3),
        ];
        let mut reversed = cases.clone();
        reversed.reverse();
        assert_eq!(
            SuiteMetrics::from_cases(&cases),
            SuiteMetrics::from_cases(&reversed)
        );
    }

    #[test]
    fn test_load_profile_total_requests() {
        assert_eq!(LoadProfile::new("/x", 5, 5).total_requests(), 25);
    }
}
