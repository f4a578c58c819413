//! Execution engine.
//!
//! Runs every suite of a plan against one environment and fills in a
//! [`Session`] as it goes:
//!
//! ```text
//! plan (high -> medium -> low)
//!   └─ suite: fixture setup ─▶ cases (gate ─▶ send ─▶ retry? ─▶ assert) ─▶ load burst
//!                 │ error
//!                 └─▶ critical issue, next suite
//! ```
//!
//! Each case is dispatched through the environment's [`RateGate`] and
//! retried only on transport errors. Expectation misses are final.

mod fixture;
mod handle;
mod load;
mod plan;

pub use fixture::{FixtureError, ReadinessCheck, SuiteFixture};
pub use handle::SessionHandle;
pub use plan::{ExecutionPlan, PlanEntry};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use probe_proto::{
    CaseStatus, CriticalIssue, Environment, ErrorKind, LoadResult, ProbeError, Session,
    SessionStatus, Suite, SuiteMetrics, TestCase, TransportError,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assertion::AssertionEngine;
use crate::rate_limit::RateGate;
use crate::transport::{HttpTransport, OutboundRequest};

/// Default in-flight cap for load bursts.
pub const DEFAULT_LOAD_CONCURRENCY: usize = 32;

/// Default base delay between retry attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Errors that stop the engine before any suite runs.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}

impl From<EngineError> for ProbeError {
    fn from(error: EngineError) -> Self {
        ProbeError::Validation(error.to_string())
    }
}

/// Tunables for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Base delay before retry `n`; the actual wait is `n * retry_backoff`.
    pub retry_backoff: Duration,

    /// In-flight cap for load bursts. `None` fires every call at once.
    pub load_concurrency: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            load_concurrency: Some(DEFAULT_LOAD_CONCURRENCY),
        }
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(EngineEvent) + Send + Sync>;

/// Events emitted while a session runs.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    RunStarted {
        session_id: String,
        suites: usize,
        cases: usize,
    },

    SuiteStarted {
        suite: String,
        cases: usize,
    },

    CaseCompleted {
        suite: String,
        case_id: String,
        route: String,
        status: CaseStatus,
        duration_ms: Option<f64>,
        attempts: u32,
    },

    /// The suite was abandoned; the session goes on.
    SuiteFailed {
        suite: String,
        error: String,
    },

    LoadCompleted {
        suite: String,
        result: LoadResult,
    },

    SuiteCompleted {
        suite: String,
        metrics: SuiteMetrics,
    },

    SessionCompleted {
        session_id: String,
        status: SessionStatus,
        pass_rate: f64,
    },
}

/// Drives suites against an API through an [`HttpTransport`].
pub struct ExecutionEngine {
    transport: Arc<dyn HttpTransport>,
    assertions: AssertionEngine,
    config: EngineConfig,
    fixtures: HashMap<String, Arc<dyn SuiteFixture>>,
    on_progress: Option<ProgressCallback>,
    cancel: Option<CancellationToken>,
}

impl ExecutionEngine {
    pub fn new(transport: Arc<dyn HttpTransport>, assertions: AssertionEngine) -> Self {
        Self {
            transport,
            assertions,
            config: EngineConfig::default(),
            fixtures: HashMap::new(),
            on_progress: None,
            cancel: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a fixture for the named suite.
    pub fn with_fixture(mut self, suite: impl Into<String>, fixture: Arc<dyn SuiteFixture>) -> Self {
        self.fixtures.insert(suite.into(), fixture);
        self
    }

    /// Sets a callback for progress updates.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Suites not yet started are skipped once the token fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    pub fn assertions(&self) -> &AssertionEngine {
        &self.assertions
    }

    fn emit_progress(&self, event: EngineEvent) {
        if let Some(callback) = &self.on_progress {
            callback(event);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Runs `suites` in a fresh session and returns it finalized.
    pub async fn run(&self, environment: &Environment, suites: &[Suite]) -> Result<Session, EngineError> {
        let session = Session::new(uuid::Uuid::new_v4().to_string(), environment.clone());
        let handle = SessionHandle::new(session);
        self.execute(environment, suites, &handle).await
    }

    /// Runs `suites` into an existing session handle.
    ///
    /// Readers holding a clone of `handle` see each case land as it settles.
    pub async fn execute(
        &self,
        environment: &Environment,
        suites: &[Suite],
        handle: &SessionHandle,
    ) -> Result<Session, EngineError> {
        let plan = ExecutionPlan::build(suites)?;
        let session_id = handle.id().await;
        let gate = RateGate::new(environment.requests_per_second);

        info!(
            session = %session_id,
            environment = %environment.name,
            suites = plan.len(),
            cases = plan.total_cases(),
            "execution starting"
        );
        self.emit_progress(EngineEvent::RunStarted {
            session_id: session_id.clone(),
            suites: plan.len(),
            cases: plan.total_cases(),
        });

        for entry in &plan.entries {
            if self.is_cancelled() {
                info!(suite = %entry.name, "stop requested, remaining suites not started");
                break;
            }

            let mut suite = suites[entry.declared_index].clone();
            suite.reset();
            handle.upsert_suite(suite.clone()).await;

            self.emit_progress(EngineEvent::SuiteStarted {
                suite: suite.name.clone(),
                cases: suite.cases.len(),
            });

            if let Err(error) = self.run_suite(environment, &gate, &mut suite, handle).await {
                warn!(suite = %suite.name, error = %error, "suite aborted");
                suite.setup_error = Some(error.to_string());
                for case in suite.cases.iter_mut().filter(|c| !c.status.is_terminal()) {
                    case.status = CaseStatus::Skipped;
                }
                handle
                    .record_issue(CriticalIssue::new(
                        error.kind(),
                        suite.name.clone(),
                        error.to_string(),
                    ))
                    .await;
                self.emit_progress(EngineEvent::SuiteFailed {
                    suite: suite.name.clone(),
                    error: error.to_string(),
                });
            }

            suite.finalize();
            self.emit_progress(EngineEvent::SuiteCompleted {
                suite: suite.name.clone(),
                metrics: suite.metrics.clone(),
            });
            handle.upsert_suite(suite).await;
        }

        let session = handle.finalize().await;
        info!(
            session = %session.id,
            status = %session.status,
            pass_rate = session.results.pass_rate,
            issues = session.critical_issues.len(),
            "execution finished"
        );
        self.emit_progress(EngineEvent::SessionCompleted {
            session_id: session.id.clone(),
            status: session.status,
            pass_rate: session.results.pass_rate,
        });
        Ok(session)
    }

    async fn run_suite(
        &self,
        environment: &Environment,
        gate: &RateGate,
        suite: &mut Suite,
        handle: &SessionHandle,
    ) -> Result<(), ProbeError> {
        let fixture = self.fixtures.get(&suite.name).cloned();
        if let Some(fixture) = &fixture {
            fixture
                .setup(suite, environment, self.transport.as_ref())
                .await
                .map_err(|e| ProbeError::SuiteSetup {
                    suite: suite.name.clone(),
                    message: e.to_string(),
                })?;
        }

        if let Some(load) = &suite.load
            && load.total_requests() == 0
        {
            return Err(ProbeError::SuiteSetup {
                suite: suite.name.clone(),
                message: "load profile dispatches zero requests".to_string(),
            });
        }

        for index in 0..suite.cases.len() {
            let case = &mut suite.cases[index];
            if case.skip {
                case.status = CaseStatus::Skipped;
            } else {
                self.run_case(environment, gate, case).await;
            }

            let case = &suite.cases[index];
            self.emit_progress(EngineEvent::CaseCompleted {
                suite: suite.name.clone(),
                case_id: case.id.clone(),
                route: case.route(),
                status: case.status,
                duration_ms: case.duration_ms,
                attempts: case.attempts,
            });
            handle
                .update_case(&suite.name, index, suite.cases[index].clone())
                .await;
        }

        if let Some(profile) = suite.load.clone() {
            let result = load::run_burst(
                self.transport.as_ref(),
                environment,
                &profile,
                gate,
                self.config.load_concurrency,
            )
            .await;
            self.emit_progress(EngineEvent::LoadCompleted {
                suite: suite.name.clone(),
                result: result.clone(),
            });
            suite.load_result = Some(result);
            handle.upsert_suite(suite.clone()).await;
        }

        if let Some(fixture) = &fixture
            && let Err(e) = fixture
                .teardown(suite, environment, self.transport.as_ref())
                .await
        {
            // Cases already settled; keep their results.
            handle
                .record_issue(CriticalIssue::new(
                    ErrorKind::SuiteSetup,
                    suite.name.clone(),
                    format!("teardown failed: {e}"),
                ))
                .await;
        }

        Ok(())
    }

    /// Sends one case with retries and records its outcome on the case.
    pub async fn run_case(&self, environment: &Environment, gate: &RateGate, case: &mut TestCase) {
        case.status = CaseStatus::Running;

        let request = match OutboundRequest::for_case(environment, case) {
            Ok(request) => request,
            Err(error) => {
                case.status = CaseStatus::Error;
                case.transport_error = Some(error);
                return;
            }
        };

        let max_attempts = environment.retries + 1;
        let started = Instant::now();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            gate.wait().await;
            case.attempts = attempt;

            let outcome = tokio::time::timeout(request.timeout, self.transport.send(&request))
                .await
                .unwrap_or_else(|_| Err(TransportError::Timeout(environment.timeout_ms)));

            match outcome {
                Ok(response) => {
                    let report = self.assertions.evaluate(&response, &case.expect);
                    case.status = if report.is_valid() && case.expect.accepts(response.status) {
                        CaseStatus::Passed
                    } else {
                        CaseStatus::Failed
                    };
                    debug!(
                        case = %case.id,
                        route = %request.route(),
                        status = response.status,
                        overall = report.overall,
                        outcome = case.status.as_str(),
                        "case settled"
                    );
                    case.duration_ms = Some(response.elapsed_ms);
                    case.validation = Some(report);
                    case.response = Some(response);
                    case.transport_error = None;
                    return;
                }
                Err(error) => {
                    warn!(
                        case = %case.id,
                        attempt,
                        max_attempts,
                        error = %error,
                        "transport error"
                    );
                    last_error = Some(error);
                    if attempt < max_attempts && !self.config.retry_backoff.is_zero() {
                        tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    }
                }
            }
        }

        case.status = CaseStatus::Error;
        case.duration_ms = Some(started.elapsed().as_secs_f64() * 1000.0);
        case.transport_error = last_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockReply, MockTransport};
    use probe_proto::{HttpMethod, LoadProfile, SuitePriority};
    use serde_json::json;
    use std::sync::Mutex;

    fn env() -> Environment {
        Environment::new("test", "http://mock").with_retries(2)
    }

    fn engine(mock: &MockTransport) -> ExecutionEngine {
        ExecutionEngine::new(Arc::new(mock.clone()), AssertionEngine::new()).with_config(
            EngineConfig {
                retry_backoff: Duration::ZERO,
                load_concurrency: Some(8),
            },
        )
    }

    #[tokio::test]
    async fn test_retries_then_errors() {
        let mock = MockTransport::new().on_get(
            "/down",
            MockReply::fail(TransportError::Network("refused".into())),
        );
        let mut case = TestCase::get("down", "/down");

        engine(&mock)
            .run_case(&env(), &RateGate::unlimited(), &mut case)
            .await;

        assert_eq!(case.status, CaseStatus::Error);
        assert_eq!(case.attempts, 3);
        assert_eq!(mock.calls_to("/down"), 3);
        assert!(matches!(case.transport_error, Some(TransportError::Network(_))));
    }

    #[tokio::test]
    async fn test_recovers_on_retry() {
        let mock = MockTransport::new().on(
            HttpMethod::Get,
            "/flaky",
            vec![
                MockReply::fail(TransportError::Timeout(10)),
                MockReply::ok(json!({})),
            ],
        );
        let mut case = TestCase::get("flaky", "/flaky");

        engine(&mock)
            .run_case(&env(), &RateGate::unlimited(), &mut case)
            .await;

        assert_eq!(case.status, CaseStatus::Passed);
        assert_eq!(case.attempts, 2);
    }

    #[tokio::test]
    async fn test_assertion_miss_is_not_retried() {
        let mock = MockTransport::new().on_get("/broken", MockReply::json(500, json!({})));
        let mut case = TestCase::get("broken", "/broken");

        engine(&mock)
            .run_case(&env(), &RateGate::unlimited(), &mut case)
            .await;

        assert_eq!(case.status, CaseStatus::Failed);
        assert_eq!(case.attempts, 1);
        assert!(!case.validation.as_ref().unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_slow_reply_times_out() {
        let mock = MockTransport::new()
            .with_fallback(MockReply::ok(json!({})).delayed(Duration::from_millis(300)));
        let environment = env().with_timeout_ms(20).with_retries(0);
        let mut case = TestCase::get("slow", "/slow");

        engine(&mock)
            .run_case(&environment, &RateGate::unlimited(), &mut case)
            .await;

        assert_eq!(case.status, CaseStatus::Error);
        assert_eq!(case.transport_error, Some(TransportError::Timeout(20)));
    }

    #[tokio::test]
    async fn test_session_runs_in_priority_order_and_emits_events() {
        let mock = MockTransport::new();
        let suites = vec![
            Suite::new("low")
                .with_priority(SuitePriority::Low)
                .with_case(TestCase::get("l1", "/low")),
            Suite::new("high")
                .with_priority(SuitePriority::High)
                .with_case(TestCase::get("h1", "/high"))
                .with_case(TestCase::get("h2", "/high2").skipped()),
        ];

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let engine = engine(&mock).on_progress(Box::new(move |event| {
            if let EngineEvent::SuiteStarted { suite, .. } = event {
                sink.lock().unwrap().push(suite);
            }
        }));

        let session = engine.run(&env(), &suites).await.unwrap();

        assert_eq!(*events.lock().unwrap(), vec!["high", "low"]);
        assert_eq!(session.plan, vec!["high".to_string(), "low".to_string()]);
        let calls: Vec<String> = mock.calls().iter().map(|c| c.path.clone()).collect();
        assert_eq!(calls, vec!["/high", "/low"]);
        assert_eq!(session.results.skipped, 1);
        assert_eq!(session.status, SessionStatus::Passed);
        assert!(session.suites.values().all(|s| s.finalized));
    }

    #[tokio::test]
    async fn test_fixture_failure_is_isolated() {
        let mock = MockTransport::new().on_get("/health", MockReply::json(503, json!({})));
        let suites = vec![
            Suite::new("guarded").with_case(TestCase::get("g", "/g")),
            Suite::new("open").with_case(TestCase::get("o", "/o")),
        ];

        let session = engine(&mock)
            .with_fixture("guarded", Arc::new(ReadinessCheck::new("/health")))
            .run(&env(), &suites)
            .await
            .unwrap();

        assert_eq!(session.critical_issues.len(), 1);
        assert_eq!(session.critical_issues[0].kind, ErrorKind::SuiteSetup);
        assert!(session.suites["guarded"].setup_error.is_some());
        assert_eq!(session.suites["guarded"].cases[0].status, CaseStatus::Skipped);
        assert_eq!(session.suites["open"].metrics.passed, 1);
        assert_eq!(mock.calls_to("/g"), 0);
        assert_eq!(session.status, SessionStatus::Partial);
    }

    #[tokio::test]
    async fn test_load_burst_recorded_on_suite() {
        let mock = MockTransport::new();
        let suites = vec![Suite::new("load").with_load(LoadProfile::new("/produtos", 5, 5))];

        let engine = engine(&mock);
        let session = engine.run(&env(), &suites).await.unwrap();

        let load = session.suites["load"].load_result.as_ref().unwrap();
        assert_eq!(load.dispatched, 25);
        assert_eq!(session.results.load_requests, 25);
        assert_eq!(session.results.throughput_rps, load.requests_per_second);
    }

    #[tokio::test]
    async fn test_duplicate_suites_rejected_before_any_call() {
        let mock = MockTransport::new();
        let suites = vec![
            Suite::new("a").with_case(TestCase::get("1", "/1")),
            Suite::new("a"),
        ];
        assert!(engine(&mock).run(&env(), &suites).await.is_err());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_engine_starts_no_suites() {
        let mock = MockTransport::new();
        let token = CancellationToken::new();
        token.cancel();
        let suites = vec![Suite::new("a").with_case(TestCase::get("1", "/1"))];

        let session = engine(&mock)
            .with_cancellation(token)
            .run(&env(), &suites)
            .await
            .unwrap();
        assert_eq!(mock.call_count(), 0);
        assert!(session.suites.is_empty());
    }
}
