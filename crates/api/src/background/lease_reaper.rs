//! Fails running jobs whose worker stopped renewing the lease.

use std::sync::Arc;
use std::time::Duration;

use noise_store::JobRegistry;
use tokio_util::sync::CancellationToken;

/// Reap expired leases every `interval` until `cancel` is triggered.
pub async fn run(registry: Arc<JobRegistry>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Lease reaper started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lease reaper stopping");
                break;
            }
            _ = ticker.tick() => {
                let reaped = registry.reap_expired_leases().await;
                for job_id in &reaped {
                    tracing::warn!(%job_id, "Worker lease expired, job marked worker_lost");
                }
            }
        }
    }
}
