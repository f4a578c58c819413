//! # probe-proto
//!
//! Shared types for the Probe API quality pipeline.
//!
//! This crate defines:
//! - The run model (`Environment`, `TestCase`, `Suite`, `Session`)
//! - Flow journeys and their results
//! - Analysis artifacts (insights, risk, recommendations, action plan)
//! - Orchestrator phases and the per-cycle `RunSummary`
//! - The single `grade` function every layer grades with
//! - The error taxonomy shared across layers

mod analysis;
mod case;
mod environment;
mod error;
mod flow;
mod grade;
mod monitoring;
mod phase;
mod schema;
mod session;
pub mod stats;
mod suite;
mod summary;
mod validation;

pub use analysis::{
    ActionHorizon, ActionItem, ActionPlan, Analysis, CompositeStrategy, Dimension,
    DimensionTrend, Effort, FlowDigest, Insight, MetricEstimate, Recommendation,
    RecommendationPriority, RiskAssessment, RiskCategory, RiskFactor, RiskLevel, ScoreDelta,
    TrendAnalysis, TrendDirection,
};
pub use case::{CapturedResponse, CaseStatus, Expectation, HttpMethod, RequestTemplate, TestCase};
pub use environment::{AuthScheme, DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS, Environment};
pub use error::{ErrorKind, ProbeError, TransportError};
pub use flow::{Flow, FlowResult, FlowStep, StepCheck, StepOutcome};
pub use grade::{Grade, clamp_score, grade};
pub use monitoring::{AlertRule, AlertSeverity, Comparator, MonitoringPlan};
pub use phase::{Phase, PhaseLog, RunState};
pub use schema::{BusinessRule, EntitySchema, FieldKind, FieldSpec};
pub use session::{CriticalIssue, OverallResults, PARTIAL_PASS_RATE, Session, SessionStatus};
pub use stats::LatencyStats;
pub use suite::{LoadProfile, LoadResult, Suite, SuiteMetrics, SuitePriority};
pub use summary::RunSummary;
pub use validation::{Check, Finding, FindingSeverity, SubScores, ValidationReport};
