//! Response scoring.
//!
//! Every captured response is scored by five independent checks, each on a
//! 0-10 scale:
//!
//! ```text
//! ┌────────────┐  ┌────────┐  ┌────────┐  ┌─────────┐  ┌──────────┐
//! │ structural │  │ status │  │ timing │  │ headers │  │ business │
//! └─────┬──────┘  └───┬────┘  └───┬────┘  └────┬────┘  └────┬─────┘
//!       └─────────────┴──────┬────┴────────────┴────────────┘
//!                            ▼
//!                    ValidationReport
//!              (mean score, findings, is_valid)
//! ```
//!
//! Errors invalidate a response; warnings only cost score.

mod business;
mod headers;
mod status;
mod structural;
mod timing;

use std::collections::BTreeMap;

use probe_proto::{
    CapturedResponse, Check, EntitySchema, Expectation, Finding, SubScores, ValidationReport,
};

pub use headers::PROTECTIVE_HEADERS;
pub(crate) use structural::parse_timestamp;

/// Default timing threshold T in milliseconds.
pub const DEFAULT_TIMING_THRESHOLD_MS: u64 = 1_000;

/// Score and findings produced by one check.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CheckOutcome {
    pub score: f64,
    pub findings: Vec<Finding>,
}

impl CheckOutcome {
    pub fn perfect() -> Self {
        Self {
            score: 10.0,
            findings: Vec::new(),
        }
    }

    pub fn new(score: f64, findings: Vec<Finding>) -> Self {
        Self { score, findings }
    }
}

/// Scores responses against expectations.
#[derive(Debug, Clone)]
pub struct AssertionEngine {
    schemas: BTreeMap<String, EntitySchema>,
    default_threshold_ms: u64,
}

impl Default for AssertionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AssertionEngine {
    pub fn new() -> Self {
        Self {
            schemas: BTreeMap::new(),
            default_threshold_ms: DEFAULT_TIMING_THRESHOLD_MS,
        }
    }

    /// Registers an entity schema for structural checks.
    pub fn with_schema(mut self, schema: EntitySchema) -> Self {
        self.schemas.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_schemas(mut self, schemas: impl IntoIterator<Item = EntitySchema>) -> Self {
        for schema in schemas {
            self.schemas.insert(schema.name.clone(), schema);
        }
        self
    }

    pub fn with_default_threshold_ms(mut self, threshold_ms: u64) -> Self {
        self.default_threshold_ms = threshold_ms.max(1);
        self
    }

    pub fn schema(&self, name: &str) -> Option<&EntitySchema> {
        self.schemas.get(name)
    }

    pub fn default_threshold_ms(&self) -> u64 {
        self.default_threshold_ms
    }

    /// Runs all five checks and assembles the report.
    pub fn evaluate(&self, response: &CapturedResponse, expect: &Expectation) -> ValidationReport {
        let threshold = expect.max_duration_ms.unwrap_or(self.default_threshold_ms);

        let outcomes = [
            (
                Check::Structural,
                structural::check(&response.body, expect.entity.as_deref(), &self.schemas),
            ),
            (Check::Status, status::check(response.status, &expect.statuses)),
            (Check::Timing, timing::check(response.elapsed_ms, threshold)),
            (Check::Headers, headers::check(response)),
            (Check::Business, business::check(&response.body, &expect.rules)),
        ];

        let mut scores = SubScores::default();
        let mut findings = Vec::new();
        for (check, outcome) in outcomes {
            scores.set(check, outcome.score);
            findings.extend(outcome.findings);
        }

        ValidationReport::new(scores, findings)
    }
}
