//! Concurrent load burst.

use std::time::Instant;

use futures::future::join_all;
use probe_proto::{Environment, LatencyStats, LoadProfile, LoadResult};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::rate_limit::RateGate;
use crate::transport::{HttpTransport, OutboundRequest};

struct Sample {
    success: bool,
    elapsed_ms: f64,
}

/// Fires `concurrent_users x requests_per_user` calls and awaits them all.
///
/// In-flight calls are capped by `cap` when set. Throughput counts every
/// settled call, successful or not, over wall-clock seconds.
pub(crate) async fn run_burst(
    transport: &dyn HttpTransport,
    environment: &Environment,
    profile: &LoadProfile,
    gate: &RateGate,
    cap: Option<usize>,
) -> LoadResult {
    let total = profile.total_requests();
    let cap = cap.filter(|c| *c > 0).map(|c| c.min(total.max(1)));
    let semaphore = cap.map(Semaphore::new);

    let mut request = OutboundRequest::new(environment, profile.method, &profile.endpoint);
    if let Some(body) = &profile.body {
        request = request.with_body(body.clone());
    }

    info!(
        endpoint = %profile.endpoint,
        users = profile.concurrent_users,
        per_user = profile.requests_per_user,
        total,
        cap = ?cap,
        "load burst starting"
    );

    let start = Instant::now();
    let calls = (0..total).map(|_| {
        let request = &request;
        let semaphore = semaphore.as_ref();
        async move {
            let _permit = match semaphore {
                Some(s) => s.acquire().await.ok(),
                None => None,
            };
            if profile.paced {
                gate.wait().await;
            }

            let call_start = Instant::now();
            match tokio::time::timeout(request.timeout, transport.send(request)).await {
                Ok(Ok(response)) => Sample {
                    success: profile.statuses.contains(&response.status),
                    elapsed_ms: response.elapsed_ms,
                },
                Ok(Err(_)) | Err(_) => Sample {
                    success: false,
                    elapsed_ms: call_start.elapsed().as_secs_f64() * 1000.0,
                },
            }
        }
    });

    let samples = join_all(calls).await;
    let elapsed = start.elapsed();

    let succeeded = samples.iter().filter(|s| s.success).count();
    let failed = samples.len() - succeeded;
    let latencies: Vec<f64> = samples.iter().map(|s| s.elapsed_ms).collect();
    let secs = elapsed.as_secs_f64().max(1e-6);

    let result = LoadResult {
        dispatched: samples.len(),
        succeeded,
        failed,
        elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        requests_per_second: (succeeded + failed) as f64 / secs,
        latency: LatencyStats::from_samples(&latencies),
        concurrency_cap: cap,
    };

    debug!(
        dispatched = result.dispatched,
        failed = result.failed,
        rps = result.requests_per_second,
        "load burst finished"
    );
    result
}
