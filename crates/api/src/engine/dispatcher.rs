//! Sync/async dispatch of process executions.
//!
//! Every submission goes through the queue; the synchronous path only adds a
//! bounded wait on the job's events. The wait holds no registry or cache
//! lock, and running out of time leaves the job untouched: the caller gets a
//! handle to poll instead of the result.

use std::sync::Arc;

use noise_core::config::OrchestrationConfig;
use noise_core::error::CoreError;
use noise_core::job::ResponseMode;
use noise_core::types::JobId;
use noise_core::validation::ValidatedRequest;
use noise_events::JobEvent;
use noise_store::{Job, JobRegistry};
use noise_worker::QueueHandle;
use tokio::sync::broadcast;

/// Outcome of [`Dispatcher::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The job reached a terminal state within the synchronous wait.
    Completed(Job),
    /// The job is queued or still running.
    Pending(Job),
}

impl Submission {
    pub fn job(&self) -> &Job {
        match self {
            Submission::Completed(job) | Submission::Pending(job) => job,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    queue: QueueHandle,
    config: Arc<OrchestrationConfig>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<JobRegistry>,
        queue: QueueHandle,
        config: Arc<OrchestrationConfig>,
    ) -> Self {
        Self {
            registry,
            queue,
            config,
        }
    }

    /// Accept `request` as a new job.
    ///
    /// Fails with [`CoreError::Busy`] when the queue is full, in which case
    /// no job is created. `mode` falls back to the configured default.
    pub async fn submit(
        &self,
        request: ValidatedRequest,
        mode: Option<ResponseMode>,
    ) -> Result<Submission, CoreError> {
        let slot = self.queue.try_reserve()?;
        let mode = mode.unwrap_or(self.config.default_response_mode);

        // Subscribe before the job exists so no transition can be missed.
        let events = match mode {
            ResponseMode::Sync => Some(self.registry.events().subscribe()),
            ResponseMode::Async => None,
        };

        let job = self.registry.create_job(Arc::new(request)).await;
        slot.send(job.id);
        tracing::info!(
            job_id = %job.id,
            process_id = %job.process,
            mode = ?mode,
            queue_depth = self.queue.depth(),
            "Job submitted",
        );

        let Some(events) = events else {
            return Ok(Submission::Pending(job));
        };

        let timeout = self.config.sync_execution_timeout;
        if tokio::time::timeout(timeout, self.wait_terminal(job.id, events))
            .await
            .is_err()
        {
            tracing::info!(
                job_id = %job.id,
                timeout_secs = timeout.as_secs(),
                "Synchronous wait elapsed, answering with a job handle",
            );
        }

        let current = self.registry.get_job(job.id).await?;
        if current.state.is_terminal() {
            Ok(Submission::Completed(current))
        } else {
            Ok(Submission::Pending(current))
        }
    }

    /// Resolve once `job_id` is terminal according to the event stream, or
    /// according to the registry when the subscription lagged or closed.
    async fn wait_terminal(&self, job_id: JobId, mut events: broadcast::Receiver<JobEvent>) {
        loop {
            match events.recv().await {
                Ok(event) if event.job_id == job_id && event.is_terminal() => return,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(%job_id, skipped, "Event subscription lagged, checking registry");
                    match self.registry.get_status(job_id).await {
                        Ok(state) if !state.is_terminal() => continue,
                        _ => return,
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}
