//! Configuration loading and validation.
//!
//! A `probe.yml` describes environments, entity schemas, suites, flows and
//! the tunables of every stage. Every section has a default, so an empty
//! file is a valid (if useless) configuration. Validation runs before any
//! network activity.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use probe_proto::{
    AuthScheme, CompositeStrategy, EntitySchema, Environment, Flow, ProbeError, Suite,
};
use probe_report::ReportConfiguration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::{AnalyzerConfig, DEFAULT_HISTORY_WINDOW};
use crate::assertion::{AssertionEngine, DEFAULT_TIMING_THRESHOLD_MS};
use crate::engine::{DEFAULT_LOAD_CONCURRENCY, EngineConfig};
use crate::flow::validate_flow;
use crate::history::{HistoryStore, JsonlHistoryStore};
use crate::orchestrator::OrchestratorConfig;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown environment '{name}' (known: {known})")]
    UnknownEnvironment { name: String, known: String },

    #[error("unknown run mode '{0}' (expected single, automated or continuous)")]
    UnknownMode(String),

    #[error("{0}")]
    Invalid(String),
}

impl From<ConfigError> for ProbeError {
    fn from(error: ConfigError) -> Self {
        ProbeError::Validation(error.to_string())
    }
}

/// How the orchestrator schedules cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// One cycle.
    #[default]
    Single,
    /// A fixed number of cycles with a delay between them.
    Automated,
    /// Cycles until stopped.
    Continuous,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Single => "single",
            RunMode::Automated => "automated",
            RunMode::Continuous => "continuous",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(RunMode::Single),
            "automated" => Ok(RunMode::Automated),
            "continuous" => Ok(RunMode::Continuous),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

/// Overrides for one environment. Unset fields keep the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<f64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthScheme>,
}

/// The built-in environment table.
pub fn builtin_environments() -> BTreeMap<String, Environment> {
    let json = ("Accept", "application/json");
    [
        Environment::new("development", "http://localhost:3000")
            .with_retries(1)
            .with_header(json.0, json.1),
        Environment::new("staging", "https://staging-api.example.com")
            .with_timeout_ms(15_000)
            .with_retries(2)
            .with_rate_limit(20.0)
            .with_header(json.0, json.1),
        Environment::new("production", "https://api.example.com")
            .with_timeout_ms(10_000)
            .with_retries(3)
            .with_rate_limit(10.0)
            .with_header(json.0, json.1),
    ]
    .into_iter()
    .map(|env| (env.name.clone(), env))
    .collect()
}

fn default_timing_threshold_ms() -> u64 {
    DEFAULT_TIMING_THRESHOLD_MS
}

fn default_load_concurrency() -> usize {
    DEFAULT_LOAD_CONCURRENCY
}

fn default_retry_backoff_ms() -> u64 {
    250
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Timing threshold T for cases that do not set their own.
    #[serde(default = "default_timing_threshold_ms")]
    pub timing_threshold_ms: u64,

    /// In-flight cap for load bursts; `0` means uncapped.
    #[serde(default = "default_load_concurrency")]
    pub load_concurrency: usize,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timing_threshold_ms: default_timing_threshold_ms(),
            load_concurrency: default_load_concurrency(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

fn default_history_path() -> PathBuf {
    PathBuf::from(".probe/history.jsonl")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default)]
    pub strategy: CompositeStrategy,

    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            strategy: CompositeStrategy::default(),
            history_path: default_history_path(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,

    #[serde(default)]
    pub entities: Vec<EntitySchema>,

    #[serde(default)]
    pub suites: Vec<Suite>,

    #[serde(default)]
    pub flows: Vec<Flow>,

    /// Suite name to a path that must answer 2xx before the suite runs.
    #[serde(default)]
    pub readiness: BTreeMap<String, String>,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub report: ReportConfiguration,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl ProbeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse_yaml(&content)
    }

    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Built-in and configured environment names, sorted.
    pub fn environment_names(&self) -> Vec<String> {
        let mut names: Vec<String> = builtin_environments().into_keys().collect();
        for name in self.environments.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        names
    }

    /// Resolves an environment: configured overrides over the built-in entry.
    pub fn environment(&self, name: &str) -> Result<Environment, ConfigError> {
        let base = builtin_environments().remove(name);
        let overrides = self.environments.get(name);

        let mut env = match (base, overrides) {
            (Some(env), _) => env,
            (None, Some(o)) => {
                let url = o.base_url.clone().ok_or_else(|| {
                    ConfigError::Invalid(format!("environment '{name}' has no base_url"))
                })?;
                Environment::new(name, url)
            }
            (None, None) => {
                return Err(ConfigError::UnknownEnvironment {
                    name: name.to_string(),
                    known: self.environment_names().join(", "),
                });
            }
        };

        if let Some(o) = overrides {
            if let Some(url) = &o.base_url {
                env.base_url = url.clone();
            }
            if let Some(timeout) = o.timeout_ms {
                env.timeout_ms = timeout;
            }
            if let Some(retries) = o.retries {
                env.retries = retries;
            }
            if o.requests_per_second.is_some() {
                env.requests_per_second = o.requests_per_second;
            }
            env.headers
                .extend(o.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
            if let Some(auth) = &o.auth {
                env.auth = auth.clone();
            }
        }
        Ok(env)
    }

    /// Checks everything that can be checked without touching the network.
    pub fn validate(&self, environment: &str) -> Result<Environment, ConfigError> {
        let env = self.environment(environment)?;
        if env.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "environment '{environment}' has an empty base_url"
            )));
        }
        if let Some(rps) = env.requests_per_second
            && !(rps.is_finite() && rps > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "environment '{environment}' requests_per_second must be positive, got {rps}"
            )));
        }

        let mut names = HashSet::new();
        for suite in &self.suites {
            if !names.insert(suite.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate suite name '{}'",
                    suite.name
                )));
            }

            let mut ids = HashSet::new();
            for case in &suite.cases {
                if case.endpoint.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "case '{}' in suite '{}' has an empty endpoint",
                        case.id, suite.name
                    )));
                }
                if !ids.insert(case.id.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate case id '{}' in suite '{}'",
                        case.id, suite.name
                    )));
                }
            }

            if let Some(load) = &suite.load {
                if load.total_requests() == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "suite '{}' load profile dispatches zero requests ({} users x {} requests)",
                        suite.name, load.concurrent_users, load.requests_per_user
                    )));
                }
                if load.endpoint.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "suite '{}' load profile has an empty endpoint",
                        suite.name
                    )));
                }
            }
        }

        for name in self.readiness.keys() {
            if !names.contains(name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "readiness check for unknown suite '{name}'"
                )));
            }
        }

        for flow in &self.flows {
            validate_flow(flow).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        Ok(env)
    }

    pub fn assertion_engine(&self) -> AssertionEngine {
        AssertionEngine::new()
            .with_schemas(self.entities.iter().cloned())
            .with_default_threshold_ms(self.execution.timing_threshold_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            retry_backoff: Duration::from_millis(self.execution.retry_backoff_ms),
            load_concurrency: (self.execution.load_concurrency > 0)
                .then_some(self.execution.load_concurrency),
        }
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            strategy: self.analysis.strategy,
            history_window: self.analysis.history_window,
        }
    }

    pub fn history_store(&self) -> JsonlHistoryStore {
        JsonlHistoryStore::new(&self.analysis.history_path)
    }

    pub fn boxed_history_store(&self) -> Box<dyn HistoryStore> {
        Box::new(self.history_store())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_proto::{HttpMethod, SuitePriority};

    const SAMPLE: &str = r#"
environments:
  staging:
    base_url: https://staging.internal
    auth:
      scheme: bearer
      token: abc
  sandbox:
    base_url: http://sandbox.local
    requests_per_second: 5
entities:
  - name: produto
    fields:
      - { name: id, type: integer, required: true }
      - { name: nome, type: string, required: true }
suites:
  - name: catalog
    priority: high
    cases:
      - id: list
        endpoint: /produtos
        expect: { statuses: [200], entity: produto }
      - id: create
        method: POST
        endpoint: /produtos
        request: { body: { nome: Cafe } }
        expect: { statuses: [201] }
    load: { concurrent_users: 5, requests_per_user: 5, endpoint: /produtos }
execution:
  load_concurrency: 0
analysis:
  strategy: worst_of
orchestrator:
  cycles: 2
"#;

    #[test]
    fn test_parse_sample() {
        let config = ProbeConfig::parse_yaml(SAMPLE).unwrap();
        assert_eq!(config.suites.len(), 1);
        let suite = &config.suites[0];
        assert_eq!(suite.priority, SuitePriority::High);
        assert_eq!(suite.cases[1].method, HttpMethod::Post);
        assert_eq!(suite.load.as_ref().unwrap().total_requests(), 25);
        assert_eq!(config.engine_config().load_concurrency, None);
        assert_eq!(config.analyzer_config().strategy, CompositeStrategy::WorstOf);
        assert_eq!(config.orchestrator.cycles, 2);
        assert!(config.assertion_engine().schema("produto").is_some());
    }

    #[test]
    fn test_empty_file_is_valid() {
        let config = ProbeConfig::parse_yaml("").unwrap();
        assert!(config.validate("development").is_ok());
        assert_eq!(config.execution.timing_threshold_ms, DEFAULT_TIMING_THRESHOLD_MS);
    }

    #[test]
    fn test_environment_merge() {
        let config = ProbeConfig::parse_yaml(SAMPLE).unwrap();

        let staging = config.environment("staging").unwrap();
        assert_eq!(staging.base_url, "https://staging.internal");
        assert_eq!(staging.timeout_ms, 15_000);
        assert_eq!(staging.auth.as_str(), "bearer");

        let sandbox = config.environment("sandbox").unwrap();
        assert_eq!(sandbox.requests_per_second, Some(5.0));

        assert!(matches!(
            config.environment("moon"),
            Err(ConfigError::UnknownEnvironment { .. })
        ));
        assert!(config.environment_names().contains(&"sandbox".to_string()));
    }

    #[test]
    fn test_run_mode_from_str() {
        assert_eq!("automated".parse::<RunMode>().unwrap(), RunMode::Automated);
        assert_eq!(" Continuous ".parse::<RunMode>().unwrap(), RunMode::Continuous);
        assert!(matches!("nightly".parse::<RunMode>(), Err(ConfigError::UnknownMode(_))));
    }

    #[test]
    fn test_validation_failures() {
        let invalid = |yaml: &str| {
            ProbeConfig::parse_yaml(yaml)
                .unwrap()
                .validate("development")
                .unwrap_err()
                .to_string()
        };

        assert!(invalid("suites: [{name: a}, {name: a}]").contains("duplicate suite"));
        assert!(
            invalid("suites: [{name: a, cases: [{id: x, endpoint: ' '}]}]").contains("empty endpoint")
        );
        assert!(
            invalid(
                "suites: [{name: a, load: {concurrent_users: 0, requests_per_user: 5, endpoint: /x}}]"
            )
            .contains("zero requests")
        );
        assert!(
            invalid("environments: {development: {requests_per_second: 0}}").contains("positive")
        );
        assert!(invalid("readiness: {ghost: /health}").contains("unknown suite"));
        assert!(
            invalid("flows: [{name: f, steps: [{name: s, method: GET, endpoint: '/x/{nope}'}]}]")
                .contains("nope")
        );
    }

    #[test]
    fn test_validation_converts_to_probe_error() {
        let err: ProbeError = ConfigError::UnknownMode("x".into()).into();
        assert_eq!(err.kind(), probe_proto::ErrorKind::Validation);
    }
}
