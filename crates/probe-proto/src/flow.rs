//! Multi-step user journeys with identifier propagation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::case::HttpMethod;

fn default_expected_status() -> u16 {
    200
}

/// Predicate over a parsed step response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum StepCheck {
    /// Dotted path resolves to a non-null value.
    FieldPresent { path: String },

    /// Dotted path equals a literal.
    FieldEquals { path: String, value: Value },

    /// Dotted path is a non-empty array.
    ArrayNotEmpty { path: String },

    /// Dotted path equals a previously captured variable.
    FieldMatchesVariable { path: String, variable: String },
}

/// One step of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    pub name: String,

    #[serde(default)]
    pub method: HttpMethod,

    /// Endpoint template, e.g. `/produtos/{produto_id}`.
    pub endpoint: String,

    /// Payload template. String leaves may carry `{placeholder}` tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Entity kind the step produces; drives the semantic capture key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    #[serde(default = "default_expected_status")]
    pub expected_status: u16,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<StepCheck>,

    /// Latency budget. Exceeding it raises an issue, never a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<u64>,

    /// Extra captures: variable name to dotted path in the response body.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capture: BTreeMap<String, String>,
}

impl FlowStep {
    pub fn new(name: impl Into<String>, method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            endpoint: endpoint.into(),
            body: None,
            entity: None,
            expected_status: default_expected_status(),
            checks: Vec::new(),
            max_latency_ms: None,
            capture: BTreeMap::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn producing(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn with_check(mut self, check: StepCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn within_ms(mut self, max_latency_ms: u64) -> Self {
        self.max_latency_ms = Some(max_latency_ms);
        self
    }

    pub fn capture(mut self, variable: impl Into<String>, path: impl Into<String>) -> Self {
        self.capture.insert(variable.into(), path.into());
        self
    }
}

/// An ordered journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub steps: Vec<FlowStep>,

    /// Wall-clock budget for the whole flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_duration_ms: Option<u64>,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            expected_duration_ms: None,
        }
    }

    pub fn step(mut self, step: FlowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_budget_ms(mut self, expected_duration_ms: u64) -> Self {
        self.expected_duration_ms = Some(expected_duration_ms);
        self
    }
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub name: String,

    /// Endpoint after placeholder substitution.
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    pub status_matched: bool,
    pub checks_passed: bool,

    /// Status match and every check passed.
    pub passed: bool,

    pub elapsed_ms: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,

    /// Variables this step added to the flow context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub captured: BTreeMap<String, Value>,
}

/// Aggregate outcome of a flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    pub flow: String,
    pub steps: Vec<StepOutcome>,
    pub total_ms: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_duration_ms: Option<u64>,

    pub within_budget: bool,

    /// Unique, in first-seen order.
    pub issues: Vec<String>,

    /// Unique, in first-seen order.
    pub recommendations: Vec<String>,

    /// Variables captured over the whole flow.
    pub variables: BTreeMap<String, Value>,
}

impl FlowResult {
    pub fn new(flow: impl Into<String>) -> Self {
        Self {
            flow: flow.into(),
            within_budget: true,
            ..Self::default()
        }
    }

    pub fn add_issue(&mut self, issue: impl Into<String>) {
        push_unique(&mut self.issues, issue.into());
    }

    pub fn add_recommendation(&mut self, recommendation: impl Into<String>) {
        push_unique(&mut self.recommendations, recommendation.into());
    }

    pub fn passed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.passed)
    }

    pub fn passed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.passed).count()
    }
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}
