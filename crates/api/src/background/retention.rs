//! Periodic removal of expired job records and results.
//!
//! Reads already treat expired entries as absent; this task only reclaims
//! their memory.

use std::sync::Arc;
use std::time::Duration;

use noise_store::JobRegistry;
use tokio_util::sync::CancellationToken;

/// Run the retention sweep every `interval` until `cancel` is triggered.
pub async fn run(registry: Arc<JobRegistry>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Retention sweep started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Retention sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                let report = registry.sweep().await;
                let live_jobs = registry.state_counts().await.total();
                if report.jobs_removed > 0 || report.results_removed > 0 {
                    tracing::info!(
                        jobs_removed = report.jobs_removed,
                        results_removed = report.results_removed,
                        live_jobs,
                        "Retention sweep: purged expired entries"
                    );
                } else {
                    tracing::debug!(live_jobs, "Retention sweep: nothing to purge");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use noise_core::clock::{Clock, ManualClock};
    use noise_core::config::OrchestrationConfig;
    use noise_core::job::JobState;
    use noise_core::process::ProcessId;
    use noise_core::validation::ValidatedRequest;
    use noise_events::EventBus;
    use noise_store::{ResultCache, TransitionPayload};
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn removes_expired_records_until_cancelled() {
        let clock = Arc::new(ManualClock::starting_now());
        let as_clock: Arc<dyn Clock> = clock.clone();
        let config = Arc::new(OrchestrationConfig {
            job_retention: Duration::from_secs(60),
            ..OrchestrationConfig::default()
        });
        let registry = Arc::new(JobRegistry::new(
            config,
            Arc::new(ResultCache::new(Arc::clone(&as_clock))),
            Arc::new(EventBus::default()),
            as_clock,
        ));

        let job = registry
            .create_job(Arc::new(ValidatedRequest {
                process: ProcessId::TrafficNoisePropagation,
                inputs: json!({}),
                outputs: vec![],
                fingerprint: String::new(),
                building_count: 0,
                road_count: 0,
            }))
            .await;
        registry
            .transition(job.id, &[JobState::Accepted], JobState::Dismissed, TransitionPayload::None)
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(120));

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(Arc::clone(&registry), Duration::from_millis(10), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        task.await.unwrap();

        // The task already removed the record.
        assert_eq!(registry.sweep().await.jobs_removed, 0);
    }
}
