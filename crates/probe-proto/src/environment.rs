//! Target environment description.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default retry count for transport failures.
pub const DEFAULT_RETRIES: u32 = 2;

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

/// How requests authenticate against the target API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "kebab-case")]
pub enum AuthScheme {
    #[default]
    None,
    Bearer {
        token: String,
    },
    ApiKey {
        #[serde(default = "default_api_key_header")]
        header: String,
        key: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl AuthScheme {
    /// Header name and value this scheme contributes, if any.
    pub fn header(&self) -> Option<(String, String)> {
        match self {
            AuthScheme::None => None,
            AuthScheme::Bearer { token } => {
                Some(("Authorization".to_string(), format!("Bearer {token}")))
            }
            AuthScheme::ApiKey { header, key } => Some((header.clone(), key.clone())),
            AuthScheme::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                Some(("Authorization".to_string(), format!("Basic {encoded}")))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::None => "none",
            AuthScheme::Bearer { .. } => "bearer",
            AuthScheme::ApiKey { .. } => "api-key",
            AuthScheme::Basic { .. } => "basic",
        }
    }
}

/// A target the pipeline runs against. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// Lookup name (development, staging, production, or custom).
    pub name: String,

    /// Base URL every endpoint is joined onto.
    pub base_url: String,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts after a transport failure.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Pacing for sequential calls. `None` disables the gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<f64>,

    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub auth: AuthScheme,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

impl Environment {
    /// Creates an environment with default timeout, retries and no auth.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: DEFAULT_RETRIES,
            requests_per_second: None,
            headers: BTreeMap::new(),
            auth: AuthScheme::None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_rate_limit(mut self, requests_per_second: f64) -> Self {
        self.requests_per_second = Some(requests_per_second);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns true when the base URL uses TLS.
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Joins a path onto the base URL with exactly one slash between them.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    /// Default headers, then auth, then per-call overrides (last one wins).
    pub fn merged_headers(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = self.headers.clone();
        if let Some((name, value)) = self.auth.header() {
            merged.insert(name, value);
        }
        for (name, value) in overrides {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_joins_with_single_slash() {
        let env = Environment::new("dev", "http://localhost:3000/api/");
        assert_eq!(env.url_for("/produtos"), "http://localhost:3000/api/produtos");
        assert_eq!(env.url_for("produtos"), "http://localhost:3000/api/produtos");
        assert_eq!(env.url_for(""), "http://localhost:3000/api");
        assert_eq!(env.url_for("https://other/x"), "https://other/x");
    }

    #[test]
    fn test_bearer_header() {
        let auth = AuthScheme::Bearer {
            token: "abc".into(),
        };
        assert_eq!(
            auth.header(),
            Some(("Authorization".to_string(), "Bearer abc".to_string()))
        );
    }

    #[test]
    fn test_basic_header_is_base64() {
        let auth = AuthScheme::Basic {
            username: "user".into(),
            password: "pass".into(),
        };
        assert_eq!(
            auth.header(),
            Some(("Authorization".to_string(), "Basic dXNlcjpwYXNz".to_string()))
        );
    }

    #[test]
    fn test_api_key_default_header_from_yaml_shape() {
        let auth: AuthScheme =
            serde_json::from_str(r#"{"scheme":"api-key","key":"secret"}"#).unwrap();
        assert_eq!(
            auth.header(),
            Some(("X-API-Key".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_merged_headers_precedence() {
        let env = Environment::new("dev", "http://x")
            .with_header("Accept", "application/json")
            .with_header("X-Trace", "default")
            .with_auth(AuthScheme::Bearer { token: "t".into() });

        let mut overrides = BTreeMap::new();
        overrides.insert("X-Trace".to_string(), "case".to_string());

        let merged = env.merged_headers(&overrides);
        assert_eq!(merged["Accept"], "application/json");
        assert_eq!(merged["X-Trace"], "case");
        assert_eq!(merged["Authorization"], "Bearer t");
    }

    #[test]
    fn test_environment_defaults_on_deserialize() {
        let env: Environment =
            serde_json::from_str(r#"{"name":"staging","base_url":"https://s"}"#).unwrap();
        assert_eq!(env.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(env.retries, DEFAULT_RETRIES);
        assert_eq!(env.auth, AuthScheme::None);
        assert!(env.is_https());
    }
}
