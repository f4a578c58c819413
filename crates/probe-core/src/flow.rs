//! Multi-step journeys.
//!
//! Steps run in order against one environment. Each step's endpoint and body
//! are filled from the variables captured so far; a step that produces an
//! entity publishes its identifier under `<entity>_id` and under `id`, so
//! later steps can reference either. A failing step does not stop the flow.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use probe_proto::{Environment, Flow, FlowResult, FlowStep, StepCheck, StepOutcome, TransportError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::template::{fill_json, fill_str, placeholders};
use crate::transport::{HttpTransport, OutboundRequest};
use crate::value_path::{lookup, scalar_to_string};

/// Paths probed, in order, for the identifier of a created entity.
const ID_PATHS: [&str; 2] = ["id", "data.id"];

/// A flow definition that can never run as written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("flow '{0}' has no steps")]
    Empty(String),

    #[error("flow '{flow}' step '{step}' uses {{{variable}}} before any step captures it")]
    UnknownVariable {
        flow: String,
        step: String,
        variable: String,
    },
}

/// Checks that every placeholder a step uses is captured by an earlier step.
///
/// Runs before any network activity; the runtime still tolerates variables
/// that go missing because an earlier step failed.
pub fn validate_flow(flow: &Flow) -> Result<(), FlowError> {
    if flow.steps.is_empty() {
        return Err(FlowError::Empty(flow.name.clone()));
    }

    let mut known: Vec<String> = Vec::new();
    for step in &flow.steps {
        let mut used = placeholders(&step.endpoint);
        if let Some(body) = &step.body {
            collect_placeholders(body, &mut used);
        }
        if let Some(variable) = used.into_iter().find(|v| !known.contains(v)) {
            return Err(FlowError::UnknownVariable {
                flow: flow.name.clone(),
                step: step.name.clone(),
                variable,
            });
        }

        if let Some(entity) = &step.entity {
            known.push(format!("{entity}_id"));
            known.push("id".to_string());
        }
        known.extend(step.capture.keys().cloned());
    }
    Ok(())
}

fn collect_placeholders(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(text) => out.extend(placeholders(text)),
        Value::Array(items) => items.iter().for_each(|v| collect_placeholders(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_placeholders(v, out)),
        _ => {}
    }
}

/// Runs [`Flow`]s through an [`HttpTransport`].
pub struct FlowRunner {
    transport: Arc<dyn HttpTransport>,
}

impl FlowRunner {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Runs every flow in order, each with a fresh variable context.
    pub async fn run_all(&self, environment: &Environment, flows: &[Flow]) -> Vec<FlowResult> {
        let mut results = Vec::with_capacity(flows.len());
        for flow in flows {
            results.push(self.run(environment, flow, BTreeMap::new()).await);
        }
        results
    }

    /// Runs one flow starting from `variables`.
    pub async fn run(
        &self,
        environment: &Environment,
        flow: &Flow,
        variables: BTreeMap<String, Value>,
    ) -> FlowResult {
        let mut result = FlowResult::new(flow.name.clone());
        result.expected_duration_ms = flow.expected_duration_ms;
        result.variables = variables;

        info!(flow = %flow.name, steps = flow.steps.len(), "flow starting");

        for step in &flow.steps {
            let outcome = self.run_step(environment, step, &mut result).await;
            if !outcome.passed {
                warn!(flow = %flow.name, step = %outcome.name, failures = ?outcome.failures, "step failed");
            }
            result.total_ms += outcome.elapsed_ms;
            result.steps.push(outcome);
        }

        if let Some(budget) = flow.expected_duration_ms
            && result.total_ms > budget as f64
        {
            result.within_budget = false;
            result.add_issue(format!(
                "Flow '{}' took {:.0} ms, over its {budget} ms budget",
                flow.name, result.total_ms
            ));
            result.add_recommendation(format!(
                "Profile the slowest steps of '{}' to bring it back under {budget} ms",
                flow.name
            ));
        }

        info!(
            flow = %flow.name,
            passed = result.passed(),
            steps_passed = result.passed_steps(),
            total_ms = result.total_ms,
            "flow finished"
        );
        result
    }

    async fn run_step(
        &self,
        environment: &Environment,
        step: &FlowStep,
        result: &mut FlowResult,
    ) -> StepOutcome {
        let endpoint = fill_str(&step.endpoint, &result.variables);
        let mut outcome = StepOutcome {
            name: step.name.clone(),
            endpoint: endpoint.value.clone(),
            status: None,
            status_matched: false,
            checks_passed: false,
            passed: false,
            elapsed_ms: 0.0,
            failures: Vec::new(),
            captured: BTreeMap::new(),
        };

        let body = step.body.as_ref().map(|b| fill_json(b, &result.variables));
        let mut unresolved = endpoint.unresolved.clone();
        if let Some(body) = &body {
            for name in &body.unresolved {
                if !unresolved.contains(name) {
                    unresolved.push(name.clone());
                }
            }
        }
        // The request still goes out with the literal `{name}` tokens left in.
        if !unresolved.is_empty() {
            let message = format!("unresolved variables: {}", unresolved.join(", "));
            result.add_issue(format!(
                "Step '{}' references variables no earlier step captured: {}",
                step.name,
                unresolved.join(", ")
            ));
            outcome.failures.push(message);
        }

        let mut request = OutboundRequest::new(environment, step.method, endpoint.value);
        if let Some(body) = body {
            request = request.with_body(body.value);
        }

        let started = Instant::now();
        let sent = tokio::time::timeout(request.timeout, self.transport.send(&request))
            .await
            .unwrap_or_else(|_| Err(TransportError::Timeout(environment.timeout_ms)));

        let response = match sent {
            Ok(response) => response,
            Err(error) => {
                outcome.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                outcome.failures.push(error.to_string());
                result.add_issue(format!("Step '{}' could not reach {}: {error}", step.name, request.path));
                result.add_recommendation(format!(
                    "Verify that {} is reachable from the test environment",
                    request.path
                ));
                return outcome;
            }
        };

        outcome.elapsed_ms = response.elapsed_ms;
        outcome.status = Some(response.status);
        outcome.status_matched = response.status == step.expected_status;
        if !outcome.status_matched {
            outcome.failures.push(format!(
                "expected status {}, got {}",
                step.expected_status, response.status
            ));
            result.add_issue(format!(
                "Step '{}' returned {} instead of {}",
                step.name, response.status, step.expected_status
            ));
        }

        if let Some(entity) = &step.entity
            && response.is_success()
        {
            match ID_PATHS.iter().find_map(|p| lookup(&response.body, p)) {
                Some(id) if !id.is_null() => {
                    outcome.captured.insert(format!("{entity}_id"), id.clone());
                    outcome.captured.insert("id".to_string(), id.clone());
                }
                _ => {
                    outcome
                        .failures
                        .push(format!("no identifier returned for {entity}"));
                    result.add_issue(format!(
                        "Step '{}' created a {entity} without returning its id",
                        step.name
                    ));
                }
            }
        }

        for (variable, path) in &step.capture {
            match lookup(&response.body, path) {
                Some(value) if !value.is_null() => {
                    outcome.captured.insert(variable.clone(), value.clone());
                }
                _ => outcome
                    .failures
                    .push(format!("nothing to capture at '{path}' for {variable}")),
            }
        }
        result
            .variables
            .extend(outcome.captured.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut checks_ok = true;
        for check in &step.checks {
            if let Err(failure) = evaluate_check(check, &response.body, &result.variables) {
                checks_ok = false;
                result.add_issue(format!("Step '{}': {failure}", step.name));
                outcome.failures.push(failure);
            }
        }
        outcome.checks_passed = checks_ok && outcome.failures.is_empty();

        if let Some(limit) = step.max_latency_ms
            && response.elapsed_ms > limit as f64
        {
            // A slow step is reported but still passes.
            result.add_issue(format!(
                "Step '{}' took {:.0} ms, over its {limit} ms limit",
                step.name, response.elapsed_ms
            ));
            result.add_recommendation(format!(
                "Optimize {} {} (caching, query tuning)",
                step.method, step.endpoint
            ));
        }

        outcome.passed = outcome.status_matched && outcome.checks_passed;
        debug!(step = %step.name, status = response.status, passed = outcome.passed, "step settled");
        outcome
    }
}

fn evaluate_check(
    check: &StepCheck,
    body: &Value,
    variables: &BTreeMap<String, Value>,
) -> Result<(), String> {
    match check {
        StepCheck::FieldPresent { path } => match lookup(body, path) {
            Some(v) if !v.is_null() => Ok(()),
            _ => Err(format!("field '{path}' is missing")),
        },
        StepCheck::FieldEquals { path, value } => match lookup(body, path) {
            Some(actual) if actual == value => Ok(()),
            Some(actual) => Err(format!("field '{path}' is {actual}, expected {value}")),
            None => Err(format!("field '{path}' is missing")),
        },
        StepCheck::ArrayNotEmpty { path } => match lookup(body, path) {
            Some(Value::Array(items)) if !items.is_empty() => Ok(()),
            Some(Value::Array(_)) => Err(format!("array '{path}' is empty")),
            _ => Err(format!("field '{path}' is not an array")),
        },
        StepCheck::FieldMatchesVariable { path, variable } => {
            let Some(expected) = variables.get(variable) else {
                return Err(format!("variable '{variable}' was never captured"));
            };
            match lookup(body, path) {
                // Ids may come back as numbers in one place and strings in another.
                Some(actual) if scalar_to_string(actual) == scalar_to_string(expected) => Ok(()),
                Some(actual) => Err(format!(
                    "field '{path}' is {actual}, expected {variable} = {expected}"
                )),
                None => Err(format!("field '{path}' is missing")),
            }
        }
    }
}
