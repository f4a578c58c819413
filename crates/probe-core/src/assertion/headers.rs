use probe_proto::{CapturedResponse, Check, Finding};

use super::CheckOutcome;

/// Protective headers every response is expected to carry.
pub const PROTECTIVE_HEADERS: [&str; 5] = [
    "x-content-type-options",
    "x-frame-options",
    "strict-transport-security",
    "content-security-policy",
    "referrer-policy",
];

fn value_ok(header: &str, value: &str) -> bool {
    let value = value.trim();
    match header {
        "x-content-type-options" => value.eq_ignore_ascii_case("nosniff"),
        "x-frame-options" => {
            value.eq_ignore_ascii_case("deny") || value.eq_ignore_ascii_case("sameorigin")
        }
        "strict-transport-security" => value.to_ascii_lowercase().contains("max-age="),
        _ => !value.is_empty(),
    }
}

/// Missing or wrong protective headers only ever warn.
pub(crate) fn check(response: &CapturedResponse) -> CheckOutcome {
    let mut correct = 0usize;
    let mut findings = Vec::new();

    for header in PROTECTIVE_HEADERS {
        match response.header(header) {
            Some(value) if value_ok(header, value) => correct += 1,
            Some(value) => findings.push(Finding::warning(
                Check::Headers,
                format!("header {header} has unexpected value '{value}'"),
            )),
            None => findings.push(Finding::warning(
                Check::Headers,
                format!("missing security header {header}"),
            )),
        }
    }

    CheckOutcome::new(
        10.0 * correct as f64 / PROTECTIVE_HEADERS.len() as f64,
        findings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_partial_headers() {
        let response = CapturedResponse::new(200, Value::Null, 1.0)
            .with_header("X-Content-Type-Options", "nosniff")
            .with_header("X-Frame-Options", "ALLOWALL");
        let outcome = check(&response);

        assert_eq!(outcome.score, 2.0);
        assert_eq!(outcome.findings.len(), 4);
        assert!(outcome.findings.iter().all(|f| !f.is_error()));
        assert!(
            outcome
                .findings
                .iter()
                .any(|f| f.message.contains("unexpected value 'ALLOWALL'"))
        );
    }

    #[test]
    fn test_hsts_requires_max_age() {
        assert!(value_ok("strict-transport-security", "max-age=600; includeSubDomains"));
        assert!(!value_ok("strict-transport-security", "includeSubDomains"));
    }
}
