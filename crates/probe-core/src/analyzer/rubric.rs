//! Pluggable rubrics for the usability and security dimensions.
//!
//! Both dimensions depend on things a black-box run can only partly observe,
//! so each is scored through a trait. The shipped heuristics use fixed
//! placeholder values where nothing is observable; swap the rubric to
//! replace them without touching the analyzer.

use probe_proto::{CapturedResponse, Dimension, Insight, Session, ValidationReport, clamp_score};

use super::performance::response_time_score;

/// Discoverability when nothing about documentation can be observed.
pub const PLACEHOLDER_DISCOVERABILITY: f64 = 75.0;

/// Error recovery when no client error was seen.
pub const PLACEHOLDER_ERROR_RECOVERY: f64 = 70.0;

/// Score deducted per detected vulnerability.
pub const VULNERABILITY_PENALTY: f64 = 20.0;

/// Fields that make a client error self-explanatory.
const ERROR_MESSAGE_FIELDS: [&str; 4] = ["message", "error", "detail", "errors"];

/// Body fragments that suggest a leaked stack trace.
const LEAK_MARKERS: [&str; 4] = ["traceback", "stack trace", "exception in", "at line"];

/// Usability sub-scores, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsabilityScores {
    pub discoverability: f64,
    pub learnability: f64,
    pub efficiency: f64,
    pub error_recovery: f64,
}

impl UsabilityScores {
    pub fn mean(&self) -> f64 {
        (self.discoverability + self.learnability + self.efficiency + self.error_recovery) / 4.0
    }
}

/// Security observations.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityScores {
    pub vulnerabilities: Vec<String>,

    /// Protective-header coverage across responses, in percent.
    pub header_compliance: f64,

    pub https: bool,
    pub authenticated: bool,
}

impl SecurityScores {
    pub fn vulnerability_score(&self) -> f64 {
        clamp_score(100.0 - VULNERABILITY_PENALTY * self.vulnerabilities.len() as f64)
    }

    pub fn transport_score(&self) -> f64 {
        if self.https { 100.0 } else { 0.0 }
    }

    pub fn authentication_score(&self) -> f64 {
        if self.authenticated { 100.0 } else { 50.0 }
    }

    /// Unweighted mean of the four components.
    pub fn mean(&self) -> f64 {
        (self.vulnerability_score()
            + self.header_compliance
            + self.transport_score()
            + self.authentication_score())
            / 4.0
    }
}

pub trait UsabilityRubric: Send + Sync {
    fn score(&self, session: &Session) -> UsabilityScores;
}

pub trait SecurityRubric: Send + Sync {
    fn score(&self, session: &Session) -> SecurityScores;
}

fn responses(session: &Session) -> impl Iterator<Item = &CapturedResponse> {
    session
        .suites
        .values()
        .flat_map(|s| s.cases.iter())
        .filter_map(|c| c.response.as_ref())
}

fn reports(session: &Session) -> impl Iterator<Item = &ValidationReport> {
    session
        .suites
        .values()
        .flat_map(|s| s.cases.iter())
        .filter_map(|c| c.validation.as_ref())
}

/// Observable heuristics plus placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicUsability;

impl UsabilityRubric for HeuristicUsability {
    fn score(&self, session: &Session) -> UsabilityScores {
        let all: Vec<&CapturedResponse> = responses(session).collect();

        let structured = all
            .iter()
            .filter(|r| r.body.is_object() || r.body.is_array())
            .count();
        let learnability = if all.is_empty() {
            0.0
        } else {
            structured as f64 / all.len() as f64 * 100.0
        };

        let client_errors: Vec<&&CapturedResponse> =
            all.iter().filter(|r| r.is_client_error()).collect();
        let error_recovery = if client_errors.is_empty() {
            PLACEHOLDER_ERROR_RECOVERY
        } else {
            let explained = client_errors
                .iter()
                .filter(|r| {
                    r.body
                        .as_object()
                        .is_some_and(|m| ERROR_MESSAGE_FIELDS.iter().any(|f| m.contains_key(*f)))
                })
                .count();
            explained as f64 / client_errors.len() as f64 * 100.0
        };

        UsabilityScores {
            discoverability: PLACEHOLDER_DISCOVERABILITY,
            learnability,
            efficiency: response_time_score(session.results.latency.avg_ms),
            error_recovery,
        }
    }
}

/// Checks response headers, bodies and the environment's transport and auth.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSecurity;

impl SecurityRubric for HeuristicSecurity {
    fn score(&self, session: &Session) -> SecurityScores {
        let mut vulnerabilities = Vec::new();
        let all: Vec<&CapturedResponse> = responses(session).collect();

        if all.iter().any(|r| r.header("x-powered-by").is_some()) {
            vulnerabilities.push("X-Powered-By discloses the server stack".to_string());
        }
        if all.iter().any(|r| {
            r.header("set-cookie").is_some_and(|c| {
                let lower = c.to_ascii_lowercase();
                !lower.contains("secure") || !lower.contains("httponly")
            })
        }) {
            vulnerabilities.push("cookies set without Secure and HttpOnly".to_string());
        }
        if all.iter().any(|r| {
            r.is_server_error()
                && r.body.as_str().map(str::to_ascii_lowercase).is_some_and(|body| {
                    LEAK_MARKERS.iter().any(|m| body.contains(m))
                })
        }) {
            vulnerabilities.push("server errors leak stack traces".to_string());
        }

        let header_scores: Vec<f64> = reports(session).map(|r| r.scores.headers * 10.0).collect();
        let header_compliance = if header_scores.is_empty() {
            0.0
        } else {
            header_scores.iter().sum::<f64>() / header_scores.len() as f64
        };

        SecurityScores {
            vulnerabilities,
            header_compliance,
            https: session.environment.is_https(),
            authenticated: session.environment.auth.header().is_some(),
        }
    }
}

pub(crate) fn usability_insight(session: &Session, rubric: &dyn UsabilityRubric) -> Insight {
    let scores = rubric.score(session);
    let mut insight = Insight::new(Dimension::Usability, scores.mean())
        .with_metric("discoverability", scores.discoverability)
        .with_metric("learnability", scores.learnability)
        .with_metric("efficiency", scores.efficiency)
        .with_metric("error_recovery", scores.error_recovery);

    for (name, value) in [
        ("Consistent structured payloads", scores.learnability),
        ("Responsive endpoints", scores.efficiency),
        ("Self-explanatory client errors", scores.error_recovery),
    ] {
        if value >= 85.0 {
            insight.strengths.push(format!("{name} ({value:.0})"));
        } else if value < 60.0 {
            insight.weaknesses.push(format!("{name} ({value:.0})"));
        }
    }
    insight
}

pub(crate) fn security_insight(session: &Session, rubric: &dyn SecurityRubric) -> Insight {
    let scores = rubric.score(session);
    let mut insight = Insight::new(Dimension::Security, scores.mean())
        .with_metric("vulnerabilities", scores.vulnerabilities.len() as f64)
        .with_metric("vulnerability_score", scores.vulnerability_score())
        .with_metric("header_compliance", scores.header_compliance)
        .with_metric("transport_score", scores.transport_score())
        .with_metric("authentication_score", scores.authentication_score());

    if scores.https {
        insight.strengths.push("Served over HTTPS".to_string());
    } else {
        insight.weaknesses.push("Served over plain HTTP".to_string());
    }
    if scores.header_compliance >= 90.0 {
        insight
            .strengths
            .push(format!("Protective headers present ({:.0}%)", scores.header_compliance));
    } else if scores.header_compliance < 60.0 {
        insight
            .weaknesses
            .push(format!("Protective headers missing ({:.0}%)", scores.header_compliance));
    }
    insight.weaknesses.extend(scores.vulnerabilities);
    insight
}
