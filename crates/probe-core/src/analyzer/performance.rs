//! Performance: latency, throughput and error rate, each tiered to 0-100.

use probe_proto::{Dimension, Insight, Session};

/// p99 above this multiple of the mean flags high variability.
pub const VARIABILITY_FACTOR: f64 = 3.0;

pub const HIGH_VARIABILITY: &str = "high variability";

/// Tiered score for mean response time.
pub fn response_time_score(avg_ms: f64) -> f64 {
    match avg_ms {
        ms if ms < 100.0 => 100.0,
        ms if ms < 200.0 => 90.0,
        ms if ms < 500.0 => 80.0,
        ms if ms < 1000.0 => 70.0,
        ms if ms < 2000.0 => 60.0,
        _ => 50.0,
    }
}

/// Tiered score for requests per second.
pub fn throughput_score(rps: f64) -> f64 {
    match rps {
        r if r >= 100.0 => 100.0,
        r if r >= 50.0 => 90.0,
        r if r >= 20.0 => 80.0,
        r if r >= 10.0 => 70.0,
        r if r >= 5.0 => 60.0,
        _ => 50.0,
    }
}

/// Tiered score for error rate in percent.
pub fn error_rate_score(error_rate: f64) -> f64 {
    match error_rate {
        e if e <= 0.1 => 100.0,
        e if e <= 1.0 => 90.0,
        e if e <= 2.0 => 80.0,
        e if e <= 5.0 => 70.0,
        e if e <= 10.0 => 60.0,
        _ => 50.0,
    }
}

pub(crate) fn analyze(session: &Session) -> Insight {
    let results = &session.results;
    let latency = &results.latency;

    let response = response_time_score(latency.avg_ms);
    let throughput = throughput_score(results.throughput_rps);
    let errors = error_rate_score(results.error_rate);
    let score = (response + throughput + errors) / 3.0;

    let mut insight = Insight::new(Dimension::Performance, score)
        .with_metric("avg_response_ms", latency.avg_ms)
        .with_metric("p50_ms", latency.p50_ms)
        .with_metric("p95_ms", latency.p95_ms)
        .with_metric("p99_ms", latency.p99_ms)
        .with_metric("max_ms", latency.max_ms)
        .with_metric("throughput_rps", results.throughput_rps)
        .with_metric("error_rate", results.error_rate)
        .with_metric("response_time_score", response)
        .with_metric("throughput_score", throughput)
        .with_metric("error_rate_score", errors);

    if latency.count == 0 {
        insight
            .observations
            .push("no responses were timed".to_string());
    }

    if response >= 90.0 {
        insight
            .strengths
            .push(format!("Fast responses ({:.0} ms average)", latency.avg_ms));
    } else if response <= 60.0 {
        insight
            .weaknesses
            .push(format!("Slow responses ({:.0} ms average)", latency.avg_ms));
    }
    if throughput >= 90.0 {
        insight
            .strengths
            .push(format!("High throughput ({:.1} req/s)", results.throughput_rps));
    } else if throughput <= 60.0 {
        insight
            .weaknesses
            .push(format!("Low throughput ({:.1} req/s)", results.throughput_rps));
    }
    if errors <= 70.0 {
        insight
            .weaknesses
            .push(format!("Error rate of {:.1}%", results.error_rate));
    }

    if latency.avg_ms > 0.0 && latency.p99_ms > VARIABILITY_FACTOR * latency.avg_ms {
        insight.weaknesses.push(format!(
            "{HIGH_VARIABILITY}: p99 {:.0} ms is more than {VARIABILITY_FACTOR}x the {:.0} ms mean",
            latency.p99_ms, latency.avg_ms
        ));
    }

    insight
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_proto::{Environment, LatencyStats};

    #[test]
    fn test_response_time_tiers() {
        assert_eq!(response_time_score(99.9), 100.0);
        assert_eq!(response_time_score(100.0), 90.0);
        assert_eq!(response_time_score(199.0), 90.0);
        assert_eq!(response_time_score(450.0), 80.0);
        assert_eq!(response_time_score(999.0), 70.0);
        assert_eq!(response_time_score(1500.0), 60.0);
        assert_eq!(response_time_score(2000.0), 50.0);
    }

    #[test]
    fn test_throughput_and_error_tiers() {
        assert_eq!(throughput_score(120.0), 100.0);
        assert_eq!(throughput_score(4.0), 50.0);
        assert_eq!(error_rate_score(0.0), 100.0);
        assert_eq!(error_rate_score(20.0), 50.0);
    }

    #[test]
    fn test_score_is_mean_of_three() {
        let mut session = Session::new("s", Environment::new("dev", "http://x"));
        session.results.latency = LatencyStats::from_samples(&[150.0]);
        session.results.throughput_rps = 30.0;
        session.results.error_rate = 0.0;

        let insight = analyze(&session);
        assert!((insight.score - (90.0 + 80.0 + 100.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_high_variability_flag() {
        let mut samples = vec![10.0; 95];
        samples.extend([5000.0; 5]);
        let mut session = Session::new("s", Environment::new("dev", "http://x"));
        session.results.latency = LatencyStats::from_samples(&samples);

        let insight = analyze(&session);
        assert!(
            insight
                .weaknesses
                .iter()
                .any(|w| w.starts_with(HIGH_VARIABILITY))
        );
        assert!(
            !insight
                .observations
                .iter()
                .any(|o| o.starts_with(HIGH_VARIABILITY))
        );

        let recs = crate::analyzer::recommend::recommend(&[insight], &[]);
        assert!(recs.iter().any(|r| r.id == "REC-PERF-002"));
    }
}
