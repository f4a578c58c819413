//! Orchestrator: sequences the pipeline and schedules cycles.
//!
//! One cycle walks `initializing -> executing -> analyzing -> reporting`
//! and ends `completed` or `failed`. A failing phase stops the phases after
//! it, except reporting, which always runs so every cycle leaves a report
//! that names the phases that did not complete.
//!
//! Cycles are scheduled by an explicit loop. [`Orchestrator::stop`] fires
//! the cancellation token; the loop exits at the next scheduling point and
//! an in-flight cycle is allowed to finish.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use probe_proto::{
    Analysis, CriticalIssue, Environment, Flow, FlowResult, Phase, PhaseLog,
    ProbeError, RunState, RunSummary, Session, SessionStatus, Suite,
};
use probe_report::{Envelope, ReportGenerator, ReportWriter, ReporterError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analyzer::{AnalyzerError, DataAnalyzer};
use crate::config::{ConfigError, ProbeConfig, RunMode};
use crate::engine::{EngineError, ExecutionEngine, ProgressCallback, ReadinessCheck, SessionHandle};
use crate::flow::FlowRunner;
use crate::history::{HistoryStore, MemoryHistoryStore};
use crate::monitoring;
use crate::transport::HttpTransport;

/// Summaries kept in memory by a continuous run.
pub const CONTINUOUS_RETAINED: usize = 100;

fn default_cycles() -> u32 {
    3
}

fn default_cycle_delay_ms() -> u64 {
    60_000
}

fn default_retry_on_failure() -> bool {
    true
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_continuous_interval_ms() -> u64 {
    300_000
}

fn default_error_backoff_ms() -> u64 {
    60_000
}

/// Scheduling tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Number of cycles in automated mode.
    #[serde(default = "default_cycles")]
    pub cycles: u32,

    /// Wait between automated cycles.
    #[serde(default = "default_cycle_delay_ms")]
    pub cycle_delay_ms: u64,

    /// Retry a failed automated cycle once before moving on.
    #[serde(default = "default_retry_on_failure")]
    pub retry_on_failure: bool,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Wait between continuous cycles.
    #[serde(default = "default_continuous_interval_ms")]
    pub continuous_interval_ms: u64,

    /// Wait after a failed continuous cycle.
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cycles: default_cycles(),
            cycle_delay_ms: default_cycle_delay_ms(),
            retry_on_failure: default_retry_on_failure(),
            retry_delay_ms: default_retry_delay_ms(),
            continuous_interval_ms: default_continuous_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
        }
    }
}

/// Errors that fail an orchestrator phase.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("nothing to run: no suites or flows configured")]
    NothingToRun,

    #[error("no session to analyze")]
    NoSession,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error("report output failed: {0}")]
    Report(#[from] ReporterError),
}

/// Callback type for orchestrator events.
pub type OrchestratorCallback = Box<dyn Fn(OrchestratorEvent) + Send + Sync>;

/// Events emitted around cycles.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    CycleStarted { cycle: u32, total: Option<u32> },

    PhaseStarted { cycle: u32, phase: Phase },

    CycleFinished { summary: Box<RunSummary> },

    /// A failed cycle will be retried after `delay_ms`.
    RetryScheduled { cycle: u32, delay_ms: u64 },

    /// The loop left because the token fired.
    Stopped { cycles_run: u32 },
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// One entry per attempted cycle, retries included.
    pub summaries: Vec<RunSummary>,
    pub cancelled: bool,
}

impl RunOutcome {
    pub fn last(&self) -> Option<&RunSummary> {
        self.summaries.last()
    }

    /// True when any cycle failed or ended with a non-passing session.
    pub fn has_failures(&self) -> bool {
        self.summaries.iter().any(|s| !s.is_clean())
    }
}

/// Drives execution, analysis, reporting and monitoring setup.
///
/// Every collaborator is injected at construction; nothing is looked up
/// globally.
pub struct Orchestrator {
    environment: Environment,
    suites: Vec<Suite>,
    flows: Vec<Flow>,
    engine: ExecutionEngine,
    flow_runner: FlowRunner,
    analyzer: DataAnalyzer,
    generator: ReportGenerator,
    writer: ReportWriter,
    envelopes: Vec<Envelope>,
    history: Box<dyn HistoryStore>,
    config: OrchestratorConfig,
    state: Mutex<RunState>,
    cancel: CancellationToken,
    on_event: Option<OrchestratorCallback>,
}

/// Artifacts carried from phase to phase within one cycle.
#[derive(Default)]
struct CycleArtifacts {
    session: Option<Session>,
    flows: Vec<FlowResult>,
    analysis: Option<Analysis>,
    history: Vec<Session>,
    written: Vec<PathBuf>,
}

impl Orchestrator {
    /// Orchestrator with default analysis, in-memory history and reports
    /// under the default output directory.
    pub fn new(environment: Environment, engine: ExecutionEngine) -> Self {
        let flow_runner = FlowRunner::new(engine.transport());
        let generator = ReportGenerator::default();
        let writer = ReportWriter::to_dir(&generator.config().output_dir);
        let envelopes = generator.config().envelopes.clone();
        Self {
            environment,
            suites: Vec::new(),
            flows: Vec::new(),
            engine,
            flow_runner,
            analyzer: DataAnalyzer::default(),
            generator,
            writer,
            envelopes,
            history: Box::new(MemoryHistoryStore::new()),
            config: OrchestratorConfig::default(),
            state: Mutex::new(RunState::Initializing),
            cancel: CancellationToken::new(),
            on_event: None,
        }
    }

    /// Wires a validated configuration to a transport.
    ///
    /// Fails before any network activity if the configuration is invalid
    /// for `environment`.
    pub fn from_config(
        config: &ProbeConfig,
        environment: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ConfigError> {
        let env = config.validate(environment)?;

        let mut engine = ExecutionEngine::new(transport, config.assertion_engine())
            .with_config(config.engine_config());
        for (suite, path) in &config.readiness {
            engine = engine.with_fixture(suite.clone(), Arc::new(ReadinessCheck::new(path.clone())));
        }

        let generator = ReportGenerator::new(config.report.clone());
        let writer = ReportWriter::to_dir(&config.report.output_dir);

        Ok(Self::new(env, engine)
            .with_suites(config.suites.clone())
            .with_flows(config.flows.clone())
            .with_analyzer(DataAnalyzer::new(config.analyzer_config()))
            .with_report(generator, writer)
            .with_history(config.boxed_history_store())
            .with_config(config.orchestrator.clone()))
    }

    pub fn with_suites(mut self, suites: Vec<Suite>) -> Self {
        self.suites = suites;
        self
    }

    pub fn with_flows(mut self, flows: Vec<Flow>) -> Self {
        self.flows = flows;
        self
    }

    pub fn with_analyzer(mut self, analyzer: DataAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Sets the generator and where its output goes. Envelopes come from
    /// the generator's configuration.
    pub fn with_report(mut self, generator: ReportGenerator, writer: ReportWriter) -> Self {
        self.envelopes = generator.config().envelopes.clone();
        self.generator = generator;
        self.writer = writer;
        self
    }

    pub fn with_envelopes(mut self, envelopes: Vec<Envelope>) -> Self {
        self.envelopes = envelopes;
        self
    }

    pub fn with_history(mut self, history: Box<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Sets a callback for engine progress updates.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.engine = self.engine.on_progress(callback);
        self
    }

    /// Sets a callback for cycle-level events.
    pub fn on_event(mut self, callback: OrchestratorCallback) -> Self {
        self.on_event = Some(callback);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// State of the current or most recent cycle.
    pub fn state(&self) -> RunState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Token that stops the scheduling loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests a stop. Pending waits end at once; a running cycle finishes.
    pub fn stop(&self) {
        info!("stop requested");
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn emit(&self, event: OrchestratorEvent) {
        if let Some(callback) = &self.on_event {
            callback(event);
        }
    }

    fn set_state(&self, state: RunState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn enter(&self, cycle: u32, phase: Phase) {
        debug!(cycle, phase = %phase, "phase starting");
        self.set_state(phase.into());
        self.emit(OrchestratorEvent::PhaseStarted { cycle, phase });
    }

    /// Runs in the given mode until done or stopped.
    pub async fn run(&self, mode: RunMode) -> RunOutcome {
        match mode {
            RunMode::Single => RunOutcome {
                summaries: vec![self.run_single().await],
                cancelled: false,
            },
            RunMode::Automated => self.run_automated().await,
            RunMode::Continuous => self.run_continuous().await,
        }
    }

    /// One pass through every phase.
    pub async fn run_single(&self) -> RunSummary {
        self.emit(OrchestratorEvent::CycleStarted {
            cycle: 1,
            total: Some(1),
        });
        self.run_cycle(1).await
    }

    /// A bounded number of cycles with a delay between them.
    ///
    /// Each cycle completes before the next is scheduled. A failed cycle is
    /// retried once when configured; the schedule then moves on either way.
    pub async fn run_automated(&self) -> RunOutcome {
        let total = self.config.cycles;
        let mut outcome = RunOutcome::default();
        info!(cycles = total, environment = %self.environment.name, "automated run starting");

        for cycle in 1..=total {
            if self.is_stopped() {
                outcome.cancelled = true;
                break;
            }
            self.emit(OrchestratorEvent::CycleStarted {
                cycle,
                total: Some(total),
            });

            let summary = self.run_cycle(cycle).await;
            let failed = summary.is_failed();
            outcome.summaries.push(summary);

            if failed && self.config.retry_on_failure {
                self.emit(OrchestratorEvent::RetryScheduled {
                    cycle,
                    delay_ms: self.config.retry_delay_ms,
                });
                warn!(cycle, delay_ms = self.config.retry_delay_ms, "cycle failed, retrying once");
                if !self.pause(self.config.retry_delay_ms).await {
                    outcome.cancelled = true;
                    break;
                }
                outcome.summaries.push(self.run_cycle(cycle).await);
            }

            if cycle < total && !self.pause(self.config.cycle_delay_ms).await {
                outcome.cancelled = true;
                break;
            }
        }

        if outcome.cancelled {
            self.emit(OrchestratorEvent::Stopped {
                cycles_run: outcome.summaries.len() as u32,
            });
        }
        info!(
            cycles = outcome.summaries.len(),
            cancelled = outcome.cancelled,
            "automated run finished"
        );
        outcome
    }

    /// Cycles until [`stop`](Self::stop) is called.
    ///
    /// A failed cycle never ends the loop; the next one starts after the
    /// error backoff instead of the regular interval. Only the most recent
    /// [`CONTINUOUS_RETAINED`] summaries are kept.
    pub async fn run_continuous(&self) -> RunOutcome {
        info!(
            interval_ms = self.config.continuous_interval_ms,
            environment = %self.environment.name,
            "continuous run starting"
        );
        let mut retained = VecDeque::with_capacity(CONTINUOUS_RETAINED);
        let mut cycle = 0u32;

        loop {
            if self.is_stopped() {
                break;
            }
            cycle = cycle.saturating_add(1);
            self.emit(OrchestratorEvent::CycleStarted { cycle, total: None });

            let summary = self.run_cycle(cycle).await;
            let delay = if summary.is_failed() {
                warn!(
                    cycle,
                    backoff_ms = self.config.error_backoff_ms,
                    "cycle failed, backing off"
                );
                self.config.error_backoff_ms
            } else {
                self.config.continuous_interval_ms
            };

            if retained.len() == CONTINUOUS_RETAINED {
                retained.pop_front();
            }
            retained.push_back(summary);

            if !self.pause(delay).await {
                break;
            }
        }

        self.emit(OrchestratorEvent::Stopped { cycles_run: cycle });
        info!(cycles = cycle, "continuous run stopped");
        RunOutcome {
            summaries: retained.into(),
            cancelled: true,
        }
    }

    /// Sleeps for `ms` unless stopped first. Returns false when stopped.
    async fn pause(&self, ms: u64) -> bool {
        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(ms)) => true,
            () = self.cancel.cancelled() => {
                info!("scheduled cycle cancelled");
                false
            }
        }
    }

    /// Runs one cycle and assembles its summary. Never fails; phase errors
    /// end up in the summary state and the report.
    pub async fn run_cycle(&self, cycle: u32) -> RunSummary {
        let started_at = Utc::now();
        let mut phases = PhaseLog::new();
        let mut artifacts = CycleArtifacts::default();

        info!(cycle, environment = %self.environment.name, "cycle starting");

        let result = match self.prepare(cycle, &mut artifacts) {
            Ok(()) => {
                phases.complete(Phase::Initializing);
                self.execute(cycle, &mut artifacts).await.map_err(|e| (Phase::Executing, e))
            }
            Err(e) => Err((Phase::Initializing, e)),
        };
        let result = result.and_then(|()| {
            phases.complete(Phase::Executing);
            self.analyze(cycle, &mut artifacts)
                .map_err(|e| (Phase::Analyzing, e))
        });
        if result.is_ok() {
            phases.complete(Phase::Analyzing);
        }

        if let Err((phase, error)) = result {
            error!(cycle, phase = phase.as_str(), error = %error, "phase failed");
            phases.fail(phase, error.to_string());
            record_phase_failure(artifacts.session.as_mut(), phase, error.to_string());
        }

        if let Some(session) = &artifacts.session
            && let Err(e) = self.history.append(session)
        {
            warn!(session = %session.id, error = %e, "could not append session to history");
        }

        // Reporting runs whatever happened before it.
        self.enter(cycle, Phase::Reporting);
        match self.report(&phases, &mut artifacts) {
            Ok(()) => phases.complete(Phase::Reporting),
            Err(e) => {
                let message = e.to_string();
                error!(cycle, phase = "reporting", error = %message, "phase failed");
                record_phase_failure(artifacts.session.as_mut(), Phase::Reporting, message.clone());
                if phases.failed.is_none() {
                    phases.fail(Phase::Reporting, message);
                }
            }
        }

        let state = match &phases.failed {
            Some((phase, message)) => RunState::Failed {
                phase: *phase,
                message: message.clone(),
            },
            None => RunState::Completed,
        };
        self.set_state(state.clone());

        let session = artifacts.session.as_ref();
        let analysis = artifacts.analysis.as_ref();
        let summary = RunSummary {
            cycle,
            session_id: session.map(|s| s.id.clone()),
            environment: self.environment.name.clone(),
            state,
            session_status: session.map(|s| s.status),
            pass_rate: session.map_or(0.0, |s| s.results.pass_rate),
            overall_score: analysis.map(|a| a.overall_score),
            grade: analysis.map(|a| a.overall_grade),
            risk_level: analysis.map(|a| a.risk.level),
            critical_issues: session.map_or(0, |s| s.critical_issues.len()),
            artifacts: artifacts.written,
            phases,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            cycle,
            state = summary.state.as_str(),
            pass_rate = summary.pass_rate,
            artifacts = summary.artifacts.len(),
            "cycle finished"
        );
        self.emit(OrchestratorEvent::CycleFinished {
            summary: Box::new(summary.clone()),
        });
        summary
    }

    fn prepare(&self, cycle: u32, artifacts: &mut CycleArtifacts) -> Result<(), OrchestratorError> {
        self.enter(cycle, Phase::Initializing);
        if self.suites.is_empty() && self.flows.is_empty() {
            return Err(OrchestratorError::NothingToRun);
        }

        let window = self.analyzer.config().history_window;
        artifacts.history = match self.history.recent(window) {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "history unavailable, analyzing without trends");
                Vec::new()
            }
        };
        debug!(sessions = artifacts.history.len(), "history loaded");
        Ok(())
    }

    async fn execute(&self, cycle: u32, artifacts: &mut CycleArtifacts) -> Result<(), OrchestratorError> {
        self.enter(cycle, Phase::Executing);
        let handle = SessionHandle::new(Session::new(
            uuid::Uuid::new_v4().to_string(),
            self.environment.clone(),
        ));
        let session = self
            .engine
            .execute(&self.environment, &self.suites, &handle)
            .await;

        // Flows run even when the suites could not be planned.
        artifacts.flows = self.flow_runner.run_all(&self.environment, &self.flows).await;

        match session {
            Ok(session) => {
                artifacts.session = Some(session);
                Ok(())
            }
            Err(e) => {
                artifacts.session = Some(handle.finalize().await);
                Err(e.into())
            }
        }
    }

    fn analyze(&self, cycle: u32, artifacts: &mut CycleArtifacts) -> Result<(), OrchestratorError> {
        self.enter(cycle, Phase::Analyzing);
        let session = artifacts
            .session
            .as_ref()
            .ok_or(OrchestratorError::NoSession)?;
        let analysis = self
            .analyzer
            .analyze(session, &artifacts.flows, &artifacts.history)?;
        artifacts.analysis = Some(analysis);
        Ok(())
    }

    /// Writes the report in every envelope, then the monitoring plan.
    fn report(&self, phases: &PhaseLog, artifacts: &mut CycleArtifacts) -> Result<(), OrchestratorError> {
        let report = self.generator.generate(
            artifacts.analysis.as_ref(),
            artifacts.session.as_ref(),
            phases,
        );
        artifacts.written = self.writer.write(&report, &self.envelopes)?;

        if let Some(analysis) = &artifacts.analysis {
            let plan = monitoring::plan(analysis);
            let path = self
                .writer
                .write_json(&format!("{}.monitoring.json", report.id), &plan)?;
            info!(
                path = %path.display(),
                alerts = plan.alerts.len(),
                check_interval_secs = plan.check_interval_secs,
                "monitoring plan written"
            );
            artifacts.written.push(path);
        }
        Ok(())
    }
}

/// Marks the session failed and records the phase error as a critical issue.
fn record_phase_failure(session: Option<&mut Session>, phase: Phase, message: String) {
    let Some(session) = session else {
        return;
    };
    let failure = ProbeError::Phase { phase, message };
    session.record_issue(CriticalIssue::new(
        failure.kind(),
        phase.as_str(),
        failure.to_string(),
    ));
    session.status = SessionStatus::Failed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::AssertionEngine;
    use crate::history::JsonlHistoryStore;
    use crate::testing::{MockReply, MockTransport};
    use probe_proto::{HttpMethod, TestCase};
    use probe_report::{ArtifactSink, MemorySink, parse_snapshot};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sink whose writes always fail.
    struct BrokenSink;

    impl ArtifactSink for BrokenSink {
        fn write(&self, _name: &str, _bytes: &[u8]) -> Result<PathBuf, ReporterError> {
            Err(ReporterError::Io(std::io::Error::other("disk full")))
        }
    }

    fn env() -> Environment {
        Environment::new("test", "http://api.test").with_retries(0)
    }

    fn suites() -> Vec<Suite> {
        vec![
            Suite::new("catalog")
                .with_case(TestCase::get("list", "/produtos"))
                .with_case(TestCase::get("one", "/produtos/1")),
        ]
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            cycles: 2,
            cycle_delay_ms: 1,
            retry_on_failure: true,
            retry_delay_ms: 1,
            continuous_interval_ms: 1,
            error_backoff_ms: 1,
        }
    }

    fn orchestrator(mock: &MockTransport, sink: Arc<dyn ArtifactSink>) -> Orchestrator {
        let engine = ExecutionEngine::new(Arc::new(mock.clone()), AssertionEngine::new());
        Orchestrator::new(env(), engine)
            .with_suites(suites())
            .with_report(ReportGenerator::default(), ReportWriter::new(sink))
            .with_config(fast_config())
    }

    #[tokio::test]
    async fn test_single_cycle_completes_all_phases() {
        let mock = MockTransport::new().with_secure_headers();
        let sink = Arc::new(MemorySink::new());
        let orch = orchestrator(&mock, sink.clone());

        let summary = orch.run_single().await;

        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(orch.state(), RunState::Completed);
        assert!(summary.phases.incomplete().is_empty());
        assert_eq!(summary.session_status, Some(SessionStatus::Passed));
        assert!((summary.pass_rate - 100.0).abs() < 1e-9);
        assert!(summary.grade.is_some());

        let id = summary.session_id.clone().unwrap();
        let names = sink.names();
        assert!(names.contains(&format!("{id}.txt")));
        assert!(names.contains(&format!("{id}.json")));
        assert!(names.contains(&format!("{id}.monitoring.json")));
        assert_eq!(summary.artifacts.len(), 3);

        let snapshot = parse_snapshot(&sink.get_string(&format!("{id}.json")).unwrap()).unwrap();
        assert_eq!(snapshot.report_id, id);
    }

    #[tokio::test]
    async fn test_nothing_to_run_fails_initializing_but_still_reports() {
        let mock = MockTransport::new();
        let sink = Arc::new(MemorySink::new());
        let orch = orchestrator(&mock, sink.clone()).with_suites(Vec::new());

        let summary = orch.run_single().await;

        assert!(matches!(
            summary.state,
            RunState::Failed {
                phase: Phase::Initializing,
                ..
            }
        ));
        assert!(summary.session_id.is_none());
        assert_eq!(mock.call_count(), 0);

        let text = sink.get_string("unknown-run.txt").unwrap();
        assert!(text.contains("initializing phase failed"));
        assert!(text.contains("Not completed: executing, analyzing"));
    }

    #[tokio::test]
    async fn test_invalid_plan_fails_executing_and_marks_session() {
        let mock = MockTransport::new();
        let sink = Arc::new(MemorySink::new());
        let duplicated = vec![
            Suite::new("a").with_case(TestCase::get("1", "/1")),
            Suite::new("a"),
        ];
        let orch = orchestrator(&mock, sink.clone()).with_suites(duplicated);

        let summary = orch.run_single().await;

        assert!(matches!(
            summary.state,
            RunState::Failed {
                phase: Phase::Executing,
                ..
            }
        ));
        assert_eq!(summary.session_status, Some(SessionStatus::Failed));
        assert_eq!(summary.critical_issues, 1);
        assert!(summary.overall_score.is_none());
        // The report still went out, without a monitoring plan.
        assert_eq!(summary.artifacts.len(), 2);
        assert!(summary.phases.is_complete(Phase::Reporting));
    }

    #[tokio::test]
    async fn test_report_failure_fails_reporting_phase() {
        let mock = MockTransport::new();
        let orch = orchestrator(&mock, Arc::new(BrokenSink));

        let summary = orch.run_single().await;

        let RunState::Failed { phase, message } = &summary.state else {
            panic!("expected failure, got {:?}", summary.state);
        };
        assert_eq!(*phase, Phase::Reporting);
        assert!(message.contains("disk full"));
        assert!(summary.phases.is_complete(Phase::Analyzing));
        assert!(summary.artifacts.is_empty());

        assert_eq!(summary.critical_issues, 1);
        assert_eq!(summary.session_status, Some(SessionStatus::Failed));
    }

    #[tokio::test]
    async fn test_each_cycle_lands_in_history() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("history.jsonl");
        let mock = MockTransport::new();
        let orch = orchestrator(&mock, Arc::new(MemorySink::new()))
            .with_history(Box::new(JsonlHistoryStore::new(&path)));

        let outcome = orch.run_automated().await;

        assert_eq!(outcome.summaries.len(), 2);
        assert!(!outcome.cancelled);
        assert!(!outcome.has_failures());
        let stored = JsonlHistoryStore::new(&path).recent(10).unwrap();
        let ids: Vec<Option<String>> = stored.into_iter().map(|s| Some(s.id)).collect();
        let expected: Vec<Option<String>> =
            outcome.summaries.iter().map(|s| s.session_id.clone()).collect();
        assert_eq!(ids, expected);
        assert_eq!(mock.calls_to("/produtos"), 2);
    }

    #[tokio::test]
    async fn test_automated_retries_failed_cycle_once() {
        let mock = MockTransport::new();
        let orch = orchestrator(&mock, Arc::new(BrokenSink));

        let outcome = orch.run_automated().await;

        // Two cycles, each failed and retried once.
        assert_eq!(outcome.summaries.len(), 4);
        let cycles: Vec<u32> = outcome.summaries.iter().map(|s| s.cycle).collect();
        assert_eq!(cycles, vec![1, 1, 2, 2]);
        assert!(outcome.has_failures());
    }

    #[tokio::test]
    async fn test_automated_without_retry() {
        let mock = MockTransport::new();
        let mut config = fast_config();
        config.retry_on_failure = false;
        config.cycles = 3;
        let orch = orchestrator(&mock, Arc::new(BrokenSink)).with_config(config);

        let outcome = orch.run_automated().await;
        assert_eq!(outcome.summaries.len(), 3);
    }

    #[tokio::test]
    async fn test_stop_before_start_runs_nothing() {
        let mock = MockTransport::new();
        let orch = orchestrator(&mock, Arc::new(MemorySink::new()));
        orch.stop();

        let outcome = orch.run_automated().await;
        assert!(outcome.cancelled);
        assert!(outcome.summaries.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_continuous_stops_after_in_flight_cycle() {
        let mock = MockTransport::new();
        let finished = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();

        let counter = finished.clone();
        let stopper = token.clone();
        let mut config = fast_config();
        config.continuous_interval_ms = 60_000;
        let orch = orchestrator(&mock, Arc::new(MemorySink::new()))
            .with_config(config)
            .with_cancellation(token)
            .on_event(Box::new(move |event| {
                if let OrchestratorEvent::CycleFinished { .. } = event
                    && counter.fetch_add(1, Ordering::SeqCst) == 2
                {
                    stopper.cancel();
                }
            }));

        let outcome = tokio::time::timeout(Duration::from_secs(5), orch.run_continuous())
            .await
            .expect("continuous loop should stop");

        assert!(outcome.cancelled);
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.summaries.len(), 3);
        assert!(outcome.summaries.iter().all(|s| s.state == RunState::Completed));
    }

    #[tokio::test]
    async fn test_continuous_keeps_going_after_failures() {
        let mock = MockTransport::new();
        let token = CancellationToken::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        let stopper = token.clone();
        let orch = orchestrator(&mock, Arc::new(BrokenSink))
            .with_cancellation(token)
            .on_event(Box::new(move |event| {
                if let OrchestratorEvent::CycleFinished { summary } = event {
                    assert!(summary.is_failed());
                    if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                        stopper.cancel();
                    }
                }
            }));

        let outcome = orch.run(RunMode::Continuous).await;
        assert_eq!(outcome.summaries.len(), 2);
        assert_eq!(outcome.summaries[1].cycle, 2);
    }

    #[tokio::test]
    async fn test_events_follow_phase_order() {
        let mock = MockTransport::new();
        let phases = Arc::new(Mutex::new(Vec::new()));
        let recorded = phases.clone();
        let orch = orchestrator(&mock, Arc::new(MemorySink::new())).on_event(Box::new(
            move |event| {
                if let OrchestratorEvent::PhaseStarted { phase, .. } = event {
                    recorded.lock().unwrap().push(phase);
                }
            },
        ));

        orch.run(RunMode::Single).await;
        assert_eq!(*phases.lock().unwrap(), Phase::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_from_config_validates_before_network() {
        let config = ProbeConfig::parse_yaml(
            r"
suites:
  - name: catalog
    cases:
      - id: list
        method: GET
        endpoint: ''
",
        )
        .unwrap();
        let mock = MockTransport::new();

        let result = Orchestrator::from_config(&config, "development", Arc::new(mock.clone()));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        assert!(matches!(
            Orchestrator::from_config(&ProbeConfig::default(), "nowhere", Arc::new(mock.clone())),
            Err(ConfigError::UnknownEnvironment { .. })
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_from_config_wires_readiness_fixture() {
        let temp = tempfile::TempDir::new().unwrap();
        let yaml = format!(
            r"
suites:
  - name: catalog
    cases:
      - id: list
        method: GET
        endpoint: /produtos
readiness:
  catalog: /health
report:
  output_dir: {}
analysis:
  history_path: {}
",
            temp.path().join("reports").display(),
            temp.path().join("history.jsonl").display()
        );
        let config = ProbeConfig::parse_yaml(&yaml).unwrap();
        let mock = MockTransport::new().on(HttpMethod::Get, "/health", vec![MockReply::json(503, json!({}))]);

        let orch = Orchestrator::from_config(&config, "development", Arc::new(mock.clone())).unwrap();
        let summary = orch.run_single().await;

        assert_eq!(mock.calls_to("/produtos"), 0);
        assert_eq!(summary.critical_issues, 1);
        assert!(temp.path().join("history.jsonl").exists());
        assert!(summary.artifacts.iter().all(|p| p.starts_with(temp.path())));
    }

    #[test]
    fn test_config_defaults_from_yaml() {
        let config: OrchestratorConfig = serde_yaml::from_str("cycles: 5").unwrap();
        assert_eq!(config.cycles, 5);
        assert_eq!(config.cycle_delay_ms, 60_000);
        assert!(config.retry_on_failure);
        assert_eq!(config.error_backoff_ms, 60_000);
    }
}
