//! # probe-core
//!
//! Engine of the Probe API quality pipeline.
//!
//! This crate provides:
//! - The assertion layer that scores one HTTP response
//! - The execution engine that runs suites, retries, paces and load-tests
//! - The flow runner for stateful multi-step journeys
//! - The data analyzer that turns sessions into insights, risk and plans
//! - Session history, configuration loading and monitoring setup
//! - The orchestrator that sequences all of the above in cycles

pub mod analyzer;
pub mod assertion;
mod config;
pub mod engine;
mod flow;
mod history;
pub mod monitoring;
mod orchestrator;
mod rate_limit;
pub mod template;
pub mod testing;
mod transport;
pub mod value_path;

pub use analyzer::{AnalyzerConfig, AnalyzerError, DEFAULT_HISTORY_WINDOW, DataAnalyzer};
pub use assertion::{AssertionEngine, DEFAULT_TIMING_THRESHOLD_MS};
pub use config::{
    AnalysisConfig, ConfigError, EnvironmentConfig, ExecutionConfig, ProbeConfig, RunMode,
    builtin_environments,
};
pub use engine::{
    DEFAULT_LOAD_CONCURRENCY, DEFAULT_RETRY_BACKOFF, EngineConfig, EngineError, EngineEvent,
    ExecutionEngine, ExecutionPlan, FixtureError, PlanEntry, ProgressCallback, ReadinessCheck,
    SessionHandle, SuiteFixture,
};
pub use flow::{FlowError, FlowRunner, validate_flow};
pub use history::{HistoryError, HistoryStore, JsonlHistoryStore, MemoryHistoryStore};
pub use orchestrator::{
    CONTINUOUS_RETAINED, Orchestrator, OrchestratorCallback, OrchestratorConfig,
    OrchestratorError, OrchestratorEvent, RunOutcome,
};
pub use rate_limit::RateGate;
pub use transport::{HttpTransport, OutboundRequest, ReqwestTransport};
