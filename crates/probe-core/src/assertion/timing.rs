use probe_proto::{Check, Finding};

use super::CheckOutcome;

/// Tiered against threshold T: <=T 10, <=2T 6, <=4T 3, beyond that 0.
pub(crate) fn check(elapsed_ms: f64, threshold_ms: u64) -> CheckOutcome {
    let t = threshold_ms as f64;

    if elapsed_ms <= t {
        CheckOutcome::perfect()
    } else if elapsed_ms <= 2.0 * t {
        CheckOutcome::new(
            6.0,
            vec![Finding::warning(
                Check::Timing,
                format!("response took {elapsed_ms:.0} ms, over the {threshold_ms} ms threshold"),
            )],
        )
    } else if elapsed_ms <= 4.0 * t {
        CheckOutcome::new(
            3.0,
            vec![Finding::warning(
                Check::Timing,
                format!("response took {elapsed_ms:.0} ms, over twice the {threshold_ms} ms threshold"),
            )],
        )
    } else {
        CheckOutcome::new(
            0.0,
            vec![Finding::error(
                Check::Timing,
                format!("response took {elapsed_ms:.0} ms, over four times the {threshold_ms} ms threshold"),
            )],
        )
    }
}
