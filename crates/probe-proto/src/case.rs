//! Test cases: one request, one expectation, one terminal outcome.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::TransportError;
use crate::schema::BusinessRule;
use crate::validation::ValidationReport;

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a test case. Exactly one terminal value after execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    Pending,
    Running,
    Passed,
    Failed,
    Error,
    Skipped,
}

impl CaseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CaseStatus::Passed | CaseStatus::Failed | CaseStatus::Error | CaseStatus::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Pending => "pending",
            CaseStatus::Running => "running",
            CaseStatus::Passed => "passed",
            CaseStatus::Failed => "failed",
            CaseStatus::Error => "error",
            CaseStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request parts that may carry `{placeholder}` tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestTemplate {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Path parameters substituted into `{name}` segments of the endpoint.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,

    /// Query string parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

fn default_statuses() -> Vec<u16> {
    vec![200]
}

/// What a response must look like to pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    /// Accepted status codes.
    #[serde(default = "default_statuses")]
    pub statuses: Vec<u16>,

    /// Entity schema name the body must conform to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    /// Timing threshold T in milliseconds. Falls back to the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<BusinessRule>,
}

impl Default for Expectation {
    fn default() -> Self {
        Self {
            statuses: default_statuses(),
            entity: None,
            max_duration_ms: None,
            rules: Vec::new(),
        }
    }
}

impl Expectation {
    pub fn accepts(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }
}

/// A response as observed on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub status: u16,

    /// Header names are stored lowercase.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Parsed JSON body. Non-JSON bodies are kept as a string, empty as null.
    #[serde(default)]
    pub body: Value,

    /// Wall-clock time from send to full body, in milliseconds.
    pub elapsed_ms: f64,
}

impl CapturedResponse {
    pub fn new(status: u16, body: Value, elapsed_ms: f64) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
            elapsed_ms,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// One request/expectation pair and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub method: HttpMethod,

    /// Path relative to the environment base URL, may contain `{param}`.
    pub endpoint: String,

    #[serde(default)]
    pub request: RequestTemplate,

    #[serde(default)]
    pub expect: Expectation,

    /// Declared as skipped; never dispatched.
    #[serde(default)]
    pub skip: bool,

    #[serde(default)]
    pub status: CaseStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<CapturedResponse>,

    /// Duration of the final attempt in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,

    /// Number of attempts made, including retries.
    #[serde(default)]
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_error: Option<TransportError>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, method: HttpMethod, endpoint: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            method,
            endpoint: endpoint.into(),
            request: RequestTemplate::default(),
            expect: Expectation::default(),
            skip: false,
            status: CaseStatus::Pending,
            response: None,
            duration_ms: None,
            attempts: 0,
            validation: None,
            transport_error: None,
        }
    }

    pub fn get(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new(id, HttpMethod::Get, endpoint)
    }

    pub fn post(id: impl Into<String>, endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(id, HttpMethod::Post, endpoint).with_body(body)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.request.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.query.insert(name.into(), value.into());
        self
    }

    pub fn expect_status(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.expect.statuses = statuses.into_iter().collect();
        self
    }

    pub fn expect_entity(mut self, entity: impl Into<String>) -> Self {
        self.expect.entity = Some(entity.into());
        self
    }

    pub fn expect_rule(mut self, rule: BusinessRule) -> Self {
        self.expect.rules.push(rule);
        self
    }

    pub fn expect_within_ms(mut self, threshold_ms: u64) -> Self {
        self.expect.max_duration_ms = Some(threshold_ms);
        self
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Label used in reports and logs: `METHOD endpoint`.
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.endpoint)
    }

    /// Clears outcome fields so the case can run again in a new cycle.
    pub fn reset(&mut self) {
        self.status = CaseStatus::Pending;
        self.response = None;
        self.duration_ms = None;
        self.attempts = 0;
        self.validation = None;
        self.transport_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_statuses() {
        for status in [
            CaseStatus::Passed,
            CaseStatus::Failed,
            CaseStatus::Error,
            CaseStatus::Skipped,
        ] {
            assert!(status.is_terminal());
        }
        assert!(!CaseStatus::Pending.is_terminal());
        assert!(!CaseStatus::Running.is_terminal());
    }

    #[test]
    fn test_case_from_minimal_json() {
        let case: TestCase =
            serde_json::from_str(r#"{"id":"list","endpoint":"/produtos"}"#).unwrap();
        assert_eq!(case.method, HttpMethod::Get);
        assert_eq!(case.expect.statuses, vec![200]);
        assert_eq!(case.status, CaseStatus::Pending);
        assert!(!case.skip);
    }

    #[test]
    fn test_reset_clears_outcome() {
        let mut case = TestCase::post("create", "/produtos", json!({"nome": "x"}))
            .expect_status([201]);
        case.status = CaseStatus::Error;
        case.attempts = 3;
        case.transport_error = Some(TransportError::Timeout(10));
        case.reset();

        assert_eq!(case.status, CaseStatus::Pending);
        assert_eq!(case.attempts, 0);
        assert!(case.transport_error.is_none());
        assert_eq!(case.expect.statuses, vec![201]);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = CapturedResponse::new(200, Value::Null, 1.0)
            .with_header("X-Frame-Options", "DENY");
        assert_eq!(response.header("x-frame-options"), Some("DENY"));
        assert_eq!(response.header("X-FRAME-OPTIONS"), Some("DENY"));
    }

    #[test]
    fn test_route_label() {
        let case = TestCase::get("one", "/produtos/{id}");
        assert_eq!(case.route(), "GET /produtos/{id}");
    }
}
