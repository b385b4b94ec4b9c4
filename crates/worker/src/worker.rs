//! One worker: claims queued jobs and carries each through its execution
//! lifecycle.
//!
//! For every dequeued id the worker
//! 1. claims the job with the `accepted -> running` compare-and-swap and
//!    skips the id when that fails (duplicate delivery, dismissed before
//!    start, already reaped);
//! 2. runs the engine in its own task, bounded by the hard time limit, while
//!    a supervisor renews the lease, forwards progress and fires the soft
//!    limit token;
//! 3. commits the outcome with a guarded `running -> terminal` transition.
//!    If the job left `running` meanwhile the outcome is discarded.

use std::sync::Arc;
use std::time::Duration;

use noise_core::config::OrchestrationConfig;
use noise_core::error::CoreError;
use noise_core::job::{JobError, JobErrorCode, JobState};
use noise_core::types::JobId;
use noise_store::{JobRegistry, TransitionPayload};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::{ComputationEngine, ComputationError, ExecutionContext, Progress, ProgressReporter};
use crate::queue::QueueConsumer;

pub struct Worker {
    id: usize,
    registry: Arc<JobRegistry>,
    engine: Arc<dyn ComputationEngine>,
    config: Arc<OrchestrationConfig>,
}

impl Worker {
    pub fn new(
        id: usize,
        registry: Arc<JobRegistry>,
        engine: Arc<dyn ComputationEngine>,
        config: Arc<OrchestrationConfig>,
    ) -> Self {
        Self {
            id,
            registry,
            engine,
            config,
        }
    }

    /// Consume the queue until `shutdown` fires or the queue closes.
    pub async fn run(self, consumer: QueueConsumer, shutdown: CancellationToken) {
        tracing::info!(worker_id = self.id, "Worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(worker_id = self.id, "Worker shutting down");
                    break;
                }
                next = consumer.recv() => match next {
                    Some(job_id) => {
                        self.process(job_id).await;
                    }
                    None => {
                        tracing::info!(worker_id = self.id, "Job queue closed, worker exiting");
                        break;
                    }
                },
            }
        }
    }

    /// Execute one job. Returns the committed terminal state, or `None` when
    /// the job was skipped or its outcome discarded.
    pub async fn process(&self, job_id: JobId) -> Option<JobState> {
        if let Err(e) = self
            .registry
            .transition(job_id, &[JobState::Accepted], JobState::Running, TransitionPayload::None)
            .await
        {
            tracing::debug!(worker_id = self.id, %job_id, error = %e, "Skipping job");
            return None;
        }
        tracing::info!(worker_id = self.id, %job_id, "Job claimed");

        let (request, cancel) = match (
            self.registry.request(job_id).await,
            self.registry.cancellation_token(job_id).await,
        ) {
            (Ok(request), Ok(cancel)) => (request, cancel),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(worker_id = self.id, %job_id, error = %e, "Claimed job vanished");
                return None;
            }
        };

        let soft_limit = CancellationToken::new();
        let (progress, progress_rx) = ProgressReporter::channel();
        let ctx = ExecutionContext {
            job_id,
            cancel: cancel.clone(),
            soft_limit: soft_limit.clone(),
            progress,
        };

        let stop_supervisor = CancellationToken::new();
        let supervisor = tokio::spawn(supervise(
            Arc::clone(&self.registry),
            job_id,
            self.config.heartbeat_interval,
            self.config.soft_time_limit,
            soft_limit,
            progress_rx,
            stop_supervisor.clone(),
        ));

        let engine = Arc::clone(&self.engine);
        let mut execution = tokio::spawn(async move { engine.execute(&request, ctx).await });
        let hard_limit = self.config.hard_time_limit;

        let outcome = tokio::select! {
            result = tokio::time::timeout(hard_limit, &mut execution) => Some(result),
            _ = cancel.cancelled() => None,
        };
        let finished = matches!(outcome, Some(Ok(_)));
        if !finished {
            // Dropping the engine future kills any child process it owns.
            execution.abort();
        }
        stop_supervisor.cancel();
        let _ = supervisor.await;

        let (to, payload) = if cancel.is_cancelled() {
            (
                JobState::Dismissed,
                TransitionPayload::Error(JobError::new(
                    JobErrorCode::Dismissed,
                    "Dismissed while running",
                )),
            )
        } else {
            match outcome {
                Some(Ok(Ok(Ok(artifact)))) => (JobState::Successful, TransitionPayload::Result(artifact)),
                Some(Ok(Ok(Err(ComputationError::Cancelled)))) => (
                    JobState::Failed,
                    TransitionPayload::Error(JobError::new(
                        JobErrorCode::ComputationError,
                        "Engine stopped without being dismissed",
                    )),
                ),
                Some(Ok(Ok(Err(e)))) => {
                    tracing::warn!(worker_id = self.id, %job_id, error = %e, "Computation failed");
                    (JobState::Failed, TransitionPayload::Error(e.into_job_error()))
                }
                Some(Ok(Err(join_error))) => {
                    tracing::error!(worker_id = self.id, %job_id, error = %join_error, "Computation task aborted");
                    let message = if join_error.is_panic() {
                        "Computation engine panicked"
                    } else {
                        "Computation task was aborted"
                    };
                    (
                        JobState::Failed,
                        TransitionPayload::Error(JobError::new(JobErrorCode::ComputationError, message)),
                    )
                }
                Some(Err(_elapsed)) => {
                    tracing::warn!(
                        worker_id = self.id,
                        %job_id,
                        limit_secs = hard_limit.as_secs(),
                        "Hard time limit exceeded"
                    );
                    (
                        JobState::Failed,
                        TransitionPayload::Error(JobError::new(
                            JobErrorCode::Timeout,
                            format!("Hard time limit of {}s exceeded", hard_limit.as_secs()),
                        )),
                    )
                }
                None => (
                    JobState::Dismissed,
                    TransitionPayload::Error(JobError::new(
                        JobErrorCode::Dismissed,
                        "Dismissed while running",
                    )),
                ),
            }
        };

        match self
            .registry
            .transition(job_id, &[JobState::Running], to, payload)
            .await
        {
            Ok(job) => {
                tracing::info!(worker_id = self.id, %job_id, state = %job.state, "Job finished");
                Some(job.state)
            }
            Err(CoreError::InvalidTransition { from, .. }) => {
                tracing::warn!(
                    worker_id = self.id,
                    %job_id,
                    current = %from,
                    outcome = %to,
                    "Job left running before completion, outcome discarded"
                );
                None
            }
            Err(e) => {
                tracing::error!(worker_id = self.id, %job_id, error = %e, "Failed to record job outcome");
                None
            }
        }
    }
}

/// Lease heartbeats, progress forwarding and the soft limit for one running
/// job. Stops when `stop` fires.
async fn supervise(
    registry: Arc<JobRegistry>,
    job_id: JobId,
    heartbeat_interval: Duration,
    soft_time_limit: Duration,
    soft_limit: CancellationToken,
    mut progress_rx: mpsc::UnboundedReceiver<Progress>,
    stop: CancellationToken,
) {
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    // The claim itself set the first lease.
    heartbeat.tick().await;
    let soft_deadline = tokio::time::sleep(soft_time_limit);
    tokio::pin!(soft_deadline);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = heartbeat.tick() => match registry.heartbeat(job_id).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!(%job_id, error = %e, "Heartbeat failed");
                    break;
                }
            },
            _ = &mut soft_deadline, if !soft_limit.is_cancelled() => {
                tracing::warn!(
                    %job_id,
                    limit_secs = soft_time_limit.as_secs(),
                    "Soft time limit reached"
                );
                soft_limit.cancel();
            }
            Some(report) = progress_rx.recv() => {
                if let Err(e) = registry.update_progress(job_id, report.percent, report.message).await {
                    tracing::debug!(%job_id, error = %e, "Dropping progress report");
                }
            }
        }
    }
}
