use probe_proto::{Check, Finding};

use super::CheckOutcome;

/// Any 5xx is an error even when expected. An unexpected 4xx is a warning,
/// any other unexpected status is an error.
pub(crate) fn check(status: u16, expected: &[u16]) -> CheckOutcome {
    if status >= 500 {
        return CheckOutcome::new(
            0.0,
            vec![Finding::error(
                Check::Status,
                format!("server error status {status}"),
            )],
        );
    }

    if expected.contains(&status) {
        return CheckOutcome::perfect();
    }

    let expected = expected
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join("|");

    if (400..500).contains(&status) {
        CheckOutcome::new(
            5.0,
            vec![Finding::warning(
                Check::Status,
                format!("unexpected client error status {status}, expected {expected}"),
            )],
        )
    } else {
        CheckOutcome::new(
            3.0,
            vec![Finding::error(
                Check::Status,
                format!("unexpected status {status}, expected {expected}"),
            )],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_status_is_perfect() {
        assert_eq!(check(201, &[200, 201]), CheckOutcome::perfect());
    }

    #[test]
    fn test_server_error_always_fails() {
        let outcome = check(503, &[503]);
        assert_eq!(outcome.score, 0.0);
        assert!(outcome.findings[0].is_error());
    }

    #[test]
    fn test_unexpected_client_error_warns() {
        let outcome = check(404, &[200]);
        assert_eq!(outcome.score, 5.0);
        assert!(!outcome.findings[0].is_error());
        assert!(outcome.findings[0].message.contains("expected 200"));
    }

    #[test]
    fn test_unexpected_success_is_error() {
        let outcome = check(204, &[201]);
        assert_eq!(outcome.score, 3.0);
        assert!(outcome.findings[0].is_error());
    }
}
