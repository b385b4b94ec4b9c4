//! A fixed set of in-process workers sharing one queue consumer.

use std::sync::Arc;
use std::time::Duration;

use noise_core::config::OrchestrationConfig;
use noise_store::JobRegistry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::ComputationEngine;
use crate::queue::QueueConsumer;
use crate::worker::Worker;

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Spawn `config.worker_concurrency` workers. Zero is valid: jobs then
    /// wait in the queue until capacity is added.
    pub fn spawn(
        consumer: QueueConsumer,
        registry: Arc<JobRegistry>,
        engine: Arc<dyn ComputationEngine>,
        config: Arc<OrchestrationConfig>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let handles = (0..config.worker_concurrency)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    Arc::clone(&registry),
                    Arc::clone(&engine),
                    Arc::clone(&config),
                );
                tokio::spawn(worker.run(consumer.clone(), shutdown.clone()))
            })
            .collect::<Vec<_>>();

        tracing::info!(workers = handles.len(), "Worker pool started");
        Self { handles, shutdown }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Stop taking new jobs and wait up to `grace` for running ones; workers
    /// still busy after that are aborted.
    pub async fn shutdown(self, grace: Duration) {
        self.shutdown.cancel();
        let deadline = tokio::time::Instant::now() + grace;
        for handle in self.handles {
            let abort = handle.abort_handle();
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                tracing::warn!("Worker did not stop within the grace period, aborting");
                abort.abort();
            }
        }
        tracing::info!("Worker pool stopped");
    }
}
