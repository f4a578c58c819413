//! Per-suite setup and teardown hooks.

use async_trait::async_trait;
use probe_proto::{Environment, HttpMethod, Suite};
use thiserror::Error;

use crate::transport::{HttpTransport, OutboundRequest};

/// A fixture could not prepare or clean up its suite.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct FixtureError(pub String);

/// Prepares whatever a suite needs before its cases run.
///
/// A failing `setup` aborts only that suite; the session records a
/// critical issue and moves on to the next suite.
#[async_trait]
pub trait SuiteFixture: Send + Sync {
    async fn setup(
        &self,
        suite: &Suite,
        environment: &Environment,
        transport: &dyn HttpTransport,
    ) -> Result<(), FixtureError>;

    async fn teardown(
        &self,
        _suite: &Suite,
        _environment: &Environment,
        _transport: &dyn HttpTransport,
    ) -> Result<(), FixtureError> {
        Ok(())
    }
}

/// Requires an endpoint to answer 2xx before the suite runs.
#[derive(Debug, Clone)]
pub struct ReadinessCheck {
    path: String,
}

impl ReadinessCheck {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SuiteFixture for ReadinessCheck {
    async fn setup(
        &self,
        suite: &Suite,
        environment: &Environment,
        transport: &dyn HttpTransport,
    ) -> Result<(), FixtureError> {
        let request = OutboundRequest::new(environment, HttpMethod::Get, &self.path);
        let response = tokio::time::timeout(request.timeout, transport.send(&request))
            .await
            .map_err(|_| {
                FixtureError(format!(
                    "{} did not answer within {} ms",
                    self.path, environment.timeout_ms
                ))
            })?
            .map_err(|e| FixtureError(format!("{} unreachable: {e}", self.path)))?;

        if response.is_success() {
            Ok(())
        } else {
            Err(FixtureError(format!(
                "{} answered {} before suite '{}'",
                self.path, response.status, suite.name
            )))
        }
    }
}
