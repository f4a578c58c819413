//! Outbound HTTP.
//!
//! The engine and flow runner talk to the API under test through the
//! [`HttpTransport`] trait. [`ReqwestTransport`] is the production
//! implementation; tests use [`crate::testing::MockTransport`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use probe_proto::{CapturedResponse, Environment, HttpMethod, TestCase, TransportError};
use serde_json::Value;
use tracing::debug;

use crate::template::fill_params;

/// A fully resolved request, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,

    /// Path relative to the base URL, kept for routing in mocks and logs.
    pub path: String,

    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl OutboundRequest {
    /// Builds a request against an environment with default headers and auth.
    pub fn new(environment: &Environment, method: HttpMethod, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method,
            url: environment.url_for(&path),
            path,
            headers: environment.merged_headers(&BTreeMap::new()),
            query: BTreeMap::new(),
            body: None,
            timeout: environment.timeout(),
        }
    }

    /// Resolves a test case: path parameters, merged headers, query, body.
    pub fn for_case(environment: &Environment, case: &TestCase) -> Result<Self, TransportError> {
        let filled = fill_params(&case.endpoint, &case.request.params);
        if !filled.is_complete() {
            return Err(TransportError::InvalidRequest(format!(
                "unresolved path parameters: {}",
                filled.unresolved.join(", ")
            )));
        }

        Ok(Self {
            method: case.method,
            url: environment.url_for(&filled.value),
            path: filled.value,
            headers: environment.merged_headers(&case.request.headers),
            query: case.request.query.clone(),
            body: case.request.body.clone(),
            timeout: environment.timeout(),
        })
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// `METHOD path` label.
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Sends requests and captures responses.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<CapturedResponse, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("probe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

fn classify(error: &reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout.as_millis() as u64)
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

/// JSON when it parses, raw text otherwise, null when empty.
pub(crate) fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<CapturedResponse, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| classify(&e, request.timeout))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(&e, request.timeout))?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(route = %request.route(), status, elapsed_ms, "response received");

        Ok(CapturedResponse {
            status,
            headers,
            body: parse_body(&bytes),
            elapsed_ms,
        })
    }
}
