//! End-to-end execution scenarios against a scripted transport.
//!
//! - A: mixed 200/500 suite gives a 20% error rate and a partial session
//! - B: a 5x5 load burst dispatches exactly 25 calls
//! - C: one broken suite setup does not stop the other five suites

use std::sync::Arc;

use async_trait::async_trait;
use probe_core::testing::{MockReply, MockTransport};
use probe_core::{AssertionEngine, ExecutionEngine, FixtureError, HttpTransport, SuiteFixture};
use probe_proto::{
    CaseStatus, Environment, ErrorKind, LoadProfile, SessionStatus, Suite, SuitePriority, TestCase,
    grade,
};
use serde_json::json;

fn env() -> Environment {
    Environment::new("scenario", "http://api.test").with_retries(0)
}

fn engine(mock: &MockTransport) -> ExecutionEngine {
    ExecutionEngine::new(Arc::new(mock.clone()), AssertionEngine::new())
}

#[tokio::test]
async fn test_scenario_a_two_server_errors_make_partial_session() {
    let mut mock = MockTransport::new().with_secure_headers();
    let mut suite = Suite::new("catalog");
    for i in 0..10 {
        let path = format!("/produtos/{i}");
        let reply = if i == 3 || i == 7 {
            MockReply::json(500, json!({"error": "boom"}))
        } else {
            MockReply::ok(json!({"id": i}))
        };
        mock = mock.on_get(&path, reply);
        suite = suite.with_case(TestCase::get(format!("case-{i}"), path));
    }

    let session = engine(&mock).run(&env(), &[suite]).await.unwrap();

    let catalog = &session.suites["catalog"];
    assert_eq!(catalog.metrics.passed, 8);
    assert_eq!(catalog.metrics.failed + catalog.metrics.errored, 2);
    assert!((catalog.metrics.error_rate - 20.0).abs() < 1e-9);
    assert!((session.results.pass_rate - 80.0).abs() < 1e-9);
    // 80% sits exactly on the partial boundary.
    assert_eq!(session.status, SessionStatus::Partial);
    assert_eq!(grade(session.results.pass_rate).as_str(), "B");

    for case in &catalog.cases {
        assert!(case.status.is_terminal());
    }
    assert_eq!(mock.call_count(), 10);
}

#[tokio::test]
async fn test_scenario_a_below_boundary_is_failed() {
    let mut mock = MockTransport::new();
    let mut suite = Suite::new("catalog");
    for i in 0..10 {
        let path = format!("/p/{i}");
        let status = if i < 3 { 500 } else { 200 };
        mock = mock.on_get(&path, MockReply::json(status, json!({})));
        suite = suite.with_case(TestCase::get(format!("c{i}"), path));
    }

    let session = engine(&mock).run(&env(), &[suite]).await.unwrap();
    assert!((session.results.pass_rate - 70.0).abs() < 1e-9);
    assert_eq!(session.status, SessionStatus::Failed);
}

#[tokio::test]
async fn test_scenario_b_load_burst_dispatches_users_times_requests() {
    let mock = MockTransport::new();
    let suite = Suite::new("load").with_load(LoadProfile::new("/produtos", 5, 5));

    let session = engine(&mock).run(&env(), &[suite]).await.unwrap();

    let load = session.suites["load"].load_result.clone().unwrap();
    assert_eq!(load.dispatched, 25);
    assert_eq!(load.settled(), 25);
    assert_eq!(mock.calls_to("/produtos"), 25);

    let expected_rps = 25.0 / (load.elapsed_ms / 1000.0);
    assert!((load.requests_per_second - expected_rps).abs() < 1e-6 * expected_rps.max(1.0));
}

#[tokio::test]
async fn test_scenario_b_failures_count_towards_throughput() {
    let mock = MockTransport::new().on(
        probe_proto::HttpMethod::Get,
        "/flaky",
        vec![
            MockReply::json(503, json!({})),
            MockReply::fail(probe_proto::TransportError::Network("reset".into())),
        ],
    );
    let suite = Suite::new("load").with_load(LoadProfile::new("/flaky", 5, 5));

    let session = engine(&mock).run(&env(), &[suite]).await.unwrap();
    let load = session.suites["load"].load_result.clone().unwrap();

    assert_eq!(load.dispatched, 25);
    assert_eq!(load.succeeded + load.failed, 25);
    assert!(load.failed >= 2);
    assert!(load.requests_per_second > 0.0);
}

struct BrokenSetup;

#[async_trait]
impl SuiteFixture for BrokenSetup {
    async fn setup(
        &self,
        _suite: &Suite,
        _environment: &Environment,
        _transport: &dyn HttpTransport,
    ) -> Result<(), FixtureError> {
        Err(FixtureError("seed data could not be created".into()))
    }
}

#[tokio::test]
async fn test_scenario_c_setup_failure_is_isolated() {
    let mock = MockTransport::new();
    let mut suites = vec![
        Suite::new("broken")
            .with_priority(SuitePriority::High)
            .with_case(TestCase::get("never", "/never")),
    ];
    for i in 0..5 {
        suites.push(Suite::new(format!("suite-{i}")).with_case(TestCase::get("ok", format!("/ok/{i}"))));
    }

    let session = engine(&mock)
        .with_fixture("broken", Arc::new(BrokenSetup))
        .run(&env(), &suites)
        .await
        .unwrap();

    assert_eq!(session.plan.first().map(String::as_str), Some("broken"));
    assert_eq!(session.critical_issues.len(), 1);
    assert_eq!(session.critical_issues[0].kind, ErrorKind::SuiteSetup);
    assert_eq!(mock.calls_to("/never"), 0);

    for i in 0..5 {
        let suite = &session.suites[&format!("suite-{i}")];
        assert_eq!(suite.cases[0].status, CaseStatus::Passed);
        assert_eq!(mock.calls_to(&format!("/ok/{i}")), 1);
    }
    assert_eq!(session.results.passed, 5);
    // Full pass rate, but a critical issue keeps the session from passing.
    assert_eq!(session.status, SessionStatus::Partial);
}
