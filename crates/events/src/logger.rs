//! Lifecycle audit log.
//!
//! [`EventLogger`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes one structured log line per job event. It runs as a long-lived
//! background task until cancelled or until the bus is dropped.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::{JobEvent, JobEventKind};

pub struct EventLogger;

impl EventLogger {
    pub async fn run(mut receiver: broadcast::Receiver<JobEvent>, cancel: CancellationToken) {
        tracing::info!("Job event logger started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job event logger stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => Self::log(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Job event logger lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, job event logger shutting down");
                        break;
                    }
                },
            }
        }
    }

    fn log(event: &JobEvent) {
        match event.kind {
            JobEventKind::Created => tracing::info!(
                job_id = %event.job_id,
                process_id = %event.process,
                "Job accepted"
            ),
            JobEventKind::StateChanged => tracing::info!(
                job_id = %event.job_id,
                process_id = %event.process,
                from = ?event.previous,
                to = %event.state,
                "Job state changed"
            ),
            JobEventKind::Progress => tracing::debug!(
                job_id = %event.job_id,
                progress = ?event.progress,
                message = ?event.message,
                "Job progress"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use noise_core::process::ProcessId;
    use noise_core::types::JobId;

    use super::*;
    use crate::bus::EventBus;

    #[tokio::test]
    async fn stops_on_cancel() {
        let bus = EventBus::default();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(EventLogger::run(bus.subscribe(), cancel.clone()));

        bus.publish(JobEvent::created(JobId::now_v7(), ProcessId::TrafficNoisePropagation));
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("logger should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn stops_when_bus_is_dropped() {
        let bus = EventBus::default();
        let handle = tokio::spawn(EventLogger::run(bus.subscribe(), CancellationToken::new()));
        drop(bus);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("logger should stop")
            .unwrap();
    }
}
