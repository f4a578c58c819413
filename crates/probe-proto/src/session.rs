//! Sessions: one complete run of every suite against one environment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::stats::{LatencyStats, percentage};
use crate::suite::Suite;

/// Pass rate (percent) at or above which a run counts as partial rather than failed.
pub const PARTIAL_PASS_RATE: f64 = 80.0;

/// Overall verdict of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Running,
    Passed,
    Partial,
    Failed,
}

impl SessionStatus {
    /// Derives the verdict from aggregate results.
    ///
    /// `passed` needs a 100% pass rate and no critical issues. `partial` covers
    /// pass rates of at least 80%, or a clean pass rate with critical issues.
    /// Anything else, including a run where nothing executed, is `failed`.
    pub fn from_results(pass_rate: f64, executed: usize, critical_issues: usize) -> Self {
        if executed == 0 {
            SessionStatus::Failed
        } else if pass_rate >= 100.0 && critical_issues == 0 {
            SessionStatus::Passed
        } else if pass_rate >= PARTIAL_PASS_RATE {
            SessionStatus::Partial
        } else {
            SessionStatus::Failed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Passed => "passed",
            SessionStatus::Partial => "partial",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-case failure recorded on the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalIssue {
    pub kind: ErrorKind,

    /// Suite name or phase name the issue came from.
    pub source: String,

    pub message: String,

    pub at: DateTime<Utc>,
}

impl CriticalIssue {
    pub fn new(kind: ErrorKind, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Aggregates across every suite of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallResults {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub pass_rate: f64,
    pub error_rate: f64,

    /// Latency over sequential cases.
    pub latency: LatencyStats,

    /// Peak load-burst throughput, or sequential throughput when no burst ran.
    pub throughput_rps: f64,

    /// Calls dispatched by load bursts.
    pub load_requests: usize,

    /// Wall-clock duration of the execution phase.
    pub elapsed_ms: f64,
}

impl OverallResults {
    pub fn executed(&self) -> usize {
        self.passed + self.failed + self.errored
    }
}

/// Top-level record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    pub environment: Environment,

    #[serde(default)]
    pub suites: BTreeMap<String, Suite>,

    /// Suite names in the order they were planned.
    #[serde(default)]
    pub plan: Vec<String>,

    #[serde(default)]
    pub results: OverallResults,

    #[serde(default)]
    pub critical_issues: Vec<CriticalIssue>,

    #[serde(default)]
    pub status: SessionStatus,
}

impl Session {
    pub fn new(id: impl Into<String>, environment: Environment) -> Self {
        Self {
            id: id.into(),
            started_at: Utc::now(),
            finished_at: None,
            environment,
            suites: BTreeMap::new(),
            plan: Vec::new(),
            results: OverallResults::default(),
            critical_issues: Vec::new(),
            status: SessionStatus::Running,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Inserts or replaces a suite, keeping plan order.
    pub fn upsert_suite(&mut self, suite: Suite) {
        if !self.plan.contains(&suite.name) {
            self.plan.push(suite.name.clone());
        }
        self.suites.insert(suite.name.clone(), suite);
    }

    pub fn record_issue(&mut self, issue: CriticalIssue) {
        self.critical_issues.push(issue);
    }

    /// Suites in plan order.
    pub fn suites_in_order(&self) -> impl Iterator<Item = &Suite> {
        self.plan.iter().filter_map(|name| self.suites.get(name))
    }

    /// Recomputes overall results from the suites without freezing.
    pub fn refresh_results(&mut self) {
        let mut results = OverallResults::default();
        let mut samples = Vec::new();
        let mut peak_load_rps: Option<f64> = None;

        for suite in self.suites.values() {
            let metrics = &suite.metrics;
            results.total += metrics.total;
            results.passed += metrics.passed;
            results.failed += metrics.failed;
            results.errored += metrics.errored;
            results.skipped += metrics.skipped;

            samples.extend(
                suite
                    .cases
                    .iter()
                    .filter_map(|c| c.response.as_ref().map(|r| r.elapsed_ms)),
            );

            if let Some(load) = &suite.load_result {
                results.load_requests += load.dispatched;
                peak_load_rps = Some(
                    peak_load_rps.map_or(load.requests_per_second, |p| p.max(load.requests_per_second)),
                );
            }
        }

        let executed = results.executed();
        results.pass_rate = percentage(results.passed, executed);
        results.error_rate = percentage(results.failed + results.errored, executed);
        results.latency = LatencyStats::from_samples(&samples);

        let end = self.finished_at.unwrap_or_else(Utc::now);
        results.elapsed_ms = (end - self.started_at).num_milliseconds().max(0) as f64;
        results.throughput_rps = match peak_load_rps {
            Some(rps) => rps,
            None if results.elapsed_ms > 0.0 => executed as f64 / (results.elapsed_ms / 1000.0),
            None => 0.0,
        };

        self.results = results;
    }

    /// Freezes the session: stamps the end time, recomputes results, derives status.
    pub fn finalize(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        self.refresh_results();
        self.status = SessionStatus::from_results(
            self.results.pass_rate,
            self.results.executed(),
            self.critical_issues.len(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{CaseStatus, CapturedResponse, TestCase};
    use crate::suite::LoadResult;
    use serde_json::Value;

    fn suite_with(name: &str, passed: usize, failed: usize) -> Suite {
        let mut suite = Suite::new(name);
        for i in 0..passed + failed {
            let mut case = TestCase::get(format!("{name}-{i}"), "/x");
            case.status = if i < passed {
                CaseStatus::Passed
            } else {
                CaseStatus::Failed
            };
            case.response = Some(CapturedResponse::new(200, Value::Null, 10.0));
            suite.cases.push(case);
        }
        suite.finalize();
        suite
    }

    #[test]
    fn test_status_boundaries() {
        assert_eq!(SessionStatus::from_results(100.0, 5, 0), SessionStatus::Passed);
        assert_eq!(SessionStatus::from_results(100.0, 5, 1), SessionStatus::Partial);
        assert_eq!(SessionStatus::from_results(80.0, 10, 0), SessionStatus::Partial);
        assert_eq!(SessionStatus::from_results(79.9, 10, 0), SessionStatus::Failed);
        assert_eq!(SessionStatus::from_results(0.0, 0, 0), SessionStatus::Failed);
    }

    #[test]
    fn test_finalize_scenario_partial() {
        let mut session = Session::new("s1", Environment::new("dev", "http://x"));
        session.upsert_suite(suite_with("catalog", 8, 2));
        session.finalize();

        assert_eq!(session.results.total, 10);
        assert_eq!(session.results.error_rate, 20.0);
        assert_eq!(session.status, SessionStatus::Partial);
        assert!(session.is_finalized());
    }

    #[test]
    fn test_throughput_prefers_load_result() {
        let mut session = Session::new("s1", Environment::new("dev", "http://x"));
        let mut suite = suite_with("load", 1, 0);
        suite.load_result = Some(LoadResult {
            dispatched: 25,
            succeeded: 25,
            failed: 0,
            elapsed_ms: 500.0,
            requests_per_second: 50.0,
            latency: LatencyStats::default(),
            concurrency_cap: None,
        });
        session.upsert_suite(suite);
        session.finalize();

        assert_eq!(session.results.throughput_rps, 50.0);
        assert_eq!(session.results.load_requests, 25);
    }

    #[test]
    fn test_upsert_keeps_plan_order() {
        let mut session = Session::new("s1", Environment::new("dev", "http://x"));
        session.upsert_suite(Suite::new("zeta"));
        session.upsert_suite(Suite::new("alpha"));
        session.upsert_suite(Suite::new("zeta"));

        let names: Vec<_> = session.suites_in_order().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }
}
