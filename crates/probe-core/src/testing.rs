//! Scripted transport for deterministic tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use probe_proto::{CapturedResponse, HttpMethod, TransportError};
use serde_json::Value;

use crate::assertion::PROTECTIVE_HEADERS;
use crate::transport::{HttpTransport, OutboundRequest};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond {
        status: u16,
        body: Value,
        headers: Vec<(String, String)>,
        /// Reported latency. Measured time is used when `None`.
        latency_ms: Option<f64>,
        /// Real time to wait before replying.
        delay: Duration,
    },
    Fail(TransportError),
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        MockReply::Respond {
            status,
            body,
            headers: Vec::new(),
            latency_ms: None,
            delay: Duration::ZERO,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    pub fn fail(error: TransportError) -> Self {
        MockReply::Fail(error)
    }

    /// Reports a fixed latency instead of measuring.
    pub fn latency(mut self, ms: f64) -> Self {
        if let MockReply::Respond { latency_ms, .. } = &mut self {
            *latency_ms = Some(ms);
        }
        self
    }

    /// Actually waits before replying.
    pub fn delayed(mut self, wait: Duration) -> Self {
        if let MockReply::Respond { delay, .. } = &mut self {
            *delay = wait;
        }
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let MockReply::Respond { headers, .. } = &mut self {
            headers.push((name.to_string(), value.to_string()));
        }
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    /// Scripted replies per `METHOD path`. The last reply repeats.
    routes: HashMap<String, Vec<MockReply>>,
    cursors: HashMap<String, usize>,
    calls: Vec<OutboundRequest>,
}

/// Transport that returns pre-scripted replies and records every call.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    fallback: MockReply,
    secure_headers: bool,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn route_key(method: HttpMethod, path: &str) -> String {
    format!("{method} {path}")
}

impl MockTransport {
    /// Unscripted routes answer `200 {}`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            fallback: MockReply::ok(Value::Object(serde_json::Map::new())),
            secure_headers: false,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reply used for routes with no script.
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Adds every protective header to every response.
    pub fn with_secure_headers(mut self) -> Self {
        self.secure_headers = true;
        self
    }

    /// Scripts replies for a route, consumed in order.
    pub fn on(self, method: HttpMethod, path: &str, replies: Vec<MockReply>) -> Self {
        self.lock()
            .routes
            .insert(route_key(method, path), replies);
        self
    }

    pub fn on_get(self, path: &str, reply: MockReply) -> Self {
        self.on(HttpMethod::Get, path, vec![reply])
    }

    pub fn on_post(self, path: &str, reply: MockReply) -> Self {
        self.on(HttpMethod::Post, path, vec![reply])
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_reply(&self, request: &OutboundRequest) -> MockReply {
        let key = route_key(request.method, &request.path);
        let mut state = self.lock();
        state.calls.push(request.clone());

        let Some(replies) = state.routes.get(&key).cloned() else {
            return self.fallback.clone();
        };
        if replies.is_empty() {
            return self.fallback.clone();
        }
        let cursor = state.cursors.entry(key).or_insert(0);
        let reply = replies[(*cursor).min(replies.len() - 1)].clone();
        *cursor += 1;
        reply
    }

    /// Every request sent so far.
    pub fn calls(&self) -> Vec<OutboundRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Calls made to a given path, any method.
    pub fn calls_to(&self, path: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.path == path).count()
    }

    /// Highest number of simultaneous in-flight calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<CapturedResponse, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let start = Instant::now();
        let reply = self.next_reply(request);
        let result = match reply {
            MockReply::Fail(error) => Err(error),
            MockReply::Respond {
                status,
                body,
                headers,
                latency_ms,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                } else {
                    tokio::task::yield_now().await;
                }
                let mut response = CapturedResponse::new(
                    status,
                    body,
                    latency_ms.unwrap_or_else(|| start.elapsed().as_secs_f64() * 1000.0),
                );
                if self.secure_headers {
                    response = secure(response);
                }
                for (name, value) in headers {
                    response = response.with_header(&name, value);
                }
                Ok(response)
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn secure(response: CapturedResponse) -> CapturedResponse {
    PROTECTIVE_HEADERS
        .iter()
        .fold(response, |response, header| {
            let value = match *header {
                "x-content-type-options" => "nosniff",
                "x-frame-options" => "DENY",
                "strict-transport-security" => "max-age=31536000",
                "content-security-policy" => "default-src 'self'",
                _ => "no-referrer",
            };
            response.with_header(header, value)
        })
}
