//! Fixed-delay pacing between calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::trace;

/// Cooperative gate that inserts `1000 / requests_per_second` ms between calls.
///
/// The first call passes immediately; every later call waits the full
/// interval. This is a fixed delay, not a token bucket: there is no burst
/// allowance and idle time is not banked.
#[derive(Debug)]
pub struct RateGate {
    interval: Option<Duration>,
    primed: Mutex<bool>,
}

impl RateGate {
    /// `None` or a non-positive rate disables pacing.
    pub fn new(requests_per_second: Option<f64>) -> Self {
        let interval = requests_per_second
            .filter(|rps| rps.is_finite() && *rps > 0.0)
            .map(|rps| Duration::from_secs_f64(1.0 / rps));
        Self {
            interval,
            primed: Mutex::new(false),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Delay inserted between calls, if pacing is on.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Waits for the gate. Concurrent callers pass one interval apart.
    pub async fn wait(&self) {
        let Some(interval) = self.interval else {
            return;
        };
        let mut primed = self.primed.lock().await;
        if *primed {
            trace!(delay_ms = interval.as_millis() as u64, "rate gate delay");
            tokio::time::sleep(interval).await;
        }
        *primed = true;
    }

    /// Forgets the previous call so the next one passes immediately.
    pub async fn reset(&self) {
        *self.primed.lock().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_interval_from_rps() {
        assert_eq!(RateGate::new(Some(4.0)).interval(), Some(Duration::from_millis(250)));
        assert_eq!(RateGate::new(Some(0.0)).interval(), None);
        assert_eq!(RateGate::new(Some(-1.0)).interval(), None);
        assert_eq!(RateGate::unlimited().interval(), None);
    }

    #[tokio::test]
    async fn test_first_call_passes_then_delays() {
        let gate = RateGate::new(Some(50.0));
        let start = Instant::now();
        gate.wait().await;
        assert!(start.elapsed() < Duration::from_millis(15));

        gate.wait().await;
        gate.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let gate = RateGate::unlimited();
        let start = Instant::now();
        for _ in 0..100 {
            gate.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_reset_skips_next_delay() {
        let gate = RateGate::new(Some(2.0));
        gate.wait().await;
        gate.reset().await;
        let start = Instant::now();
        gate.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
