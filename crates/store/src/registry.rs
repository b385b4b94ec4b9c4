//! The job registry: identity, lifecycle state and terminal detail of every
//! job.
//!
//! [`JobRegistry::transition`] is the single mutation point for job state.
//! It is a compare-and-swap on the current state performed under the
//! registry's write lock, so when two callers race on the same edge exactly
//! one of them wins. Events for committed changes are published after the
//! lock is released.
//!
//! Terminal records carry a retention deadline. Reads past that deadline
//! behave exactly like reads of an id that never existed; the background
//! sweep removes the records physically.

use std::collections::HashMap;
use std::sync::Arc;

use noise_core::clock::{deadline_after, Clock};
use noise_core::config::OrchestrationConfig;
use noise_core::error::CoreError;
use noise_core::job::{JobError, JobErrorCode, JobState};
use noise_core::types::{JobId, Timestamp};
use noise_core::validation::ValidatedRequest;
use noise_events::{EventBus, JobEvent};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::cache::ResultCache;
use crate::models::artifact::{ArtifactPayload, CacheLookup, ResultArtifact};
use crate::models::job::{Job, JobFilter, JobRecord, StateCounts};

/// Data stored alongside a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionPayload {
    None,
    /// Only valid with `successful`; stored in the result cache.
    Result(ArtifactPayload),
    /// Only valid with `failed` or `dismissed`.
    Error(JobError),
}

/// What one retention sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub jobs_removed: usize,
    pub results_removed: usize,
}

pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    cache: Arc<ResultCache>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    config: Arc<OrchestrationConfig>,
}

impl JobRegistry {
    pub fn new(
        config: Arc<OrchestrationConfig>,
        cache: Arc<ResultCache>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            cache,
            events,
            clock,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Creation and transitions
    // -----------------------------------------------------------------------

    /// Register a new job in `accepted` for `request`.
    pub async fn create_job(&self, request: Arc<ValidatedRequest>) -> Job {
        let now = self.clock.now();
        let job = {
            let mut jobs = self.jobs.write().await;
            let mut id = JobId::now_v7();
            while jobs.contains_key(&id) {
                id = JobId::now_v7();
            }
            let job = Job {
                id,
                process: request.process,
                fingerprint: request.fingerprint.clone(),
                state: JobState::Accepted,
                created_at: now,
                updated_at: now,
                started_at: None,
                finished_at: None,
                progress: None,
                message: None,
                error: None,
                result_key: None,
                expires_at: None,
            };
            jobs.insert(
                id,
                JobRecord {
                    job: job.clone(),
                    request,
                    cancel: CancellationToken::new(),
                    lease_expires_at: None,
                },
            );
            job
        };

        tracing::debug!(job_id = %job.id, process_id = %job.process, "Job created");
        self.events.publish(JobEvent::created(job.id, job.process));
        job
    }

    /// Move `id` to `to` if its current state is one of `expected` and the
    /// edge exists in the state graph.
    pub async fn transition(
        &self,
        id: JobId,
        expected: &[JobState],
        to: JobState,
        payload: TransitionPayload,
    ) -> Result<Job, CoreError> {
        let (job, from) = {
            let mut jobs = self.jobs.write().await;
            let now = self.clock.now();
            let record = jobs
                .get_mut(&id)
                .filter(|r| !r.job.is_expired(now))
                .ok_or_else(|| CoreError::job_not_found(id))?;

            let from = record.job.state;
            if !expected.contains(&from) || !from.can_transition(to) {
                return Err(CoreError::InvalidTransition { from, to });
            }

            match (&payload, to) {
                (TransitionPayload::Result(_), JobState::Successful)
                | (TransitionPayload::Error(_), JobState::Failed | JobState::Dismissed)
                | (TransitionPayload::None, _) => {}
                _ => {
                    return Err(CoreError::Internal(format!(
                        "payload does not match transition to {to}"
                    )))
                }
            }

            // Store the artifact before the state changes so a job is never
            // observed `successful` without its result.
            match payload {
                TransitionPayload::Result(artifact) => {
                    self.cache.put(id, artifact, self.config.result_ttl).await?;
                    record.job.result_key = Some(id);
                }
                TransitionPayload::Error(error) => {
                    record.job.message = Some(error.message.clone());
                    record.job.error = Some(error);
                }
                TransitionPayload::None => {}
            }

            self.apply(record, to, now);
            (record.job.clone(), from)
        };

        tracing::debug!(job_id = %id, %from, %to, "Job transitioned");
        self.events
            .publish(JobEvent::state_changed(id, job.process, from, to));
        Ok(job)
    }

    fn apply(&self, record: &mut JobRecord, to: JobState, now: Timestamp) {
        let job = &mut record.job;
        job.state = to;
        job.updated_at = now;
        match to {
            JobState::Running => {
                job.started_at = Some(now);
                job.progress = Some(0);
                record.lease_expires_at = Some(deadline_after(now, self.config.worker_lease));
            }
            JobState::Successful | JobState::Failed | JobState::Dismissed => {
                if to == JobState::Successful {
                    job.progress = Some(100);
                }
                job.finished_at = Some(now);
                job.expires_at = Some(deadline_after(now, self.config.job_retention));
                record.lease_expires_at = None;
            }
            JobState::Accepted => {}
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get_job(&self, id: JobId) -> Result<Job, CoreError> {
        let now = self.clock.now();
        self.jobs
            .read()
            .await
            .get(&id)
            .map(|r| &r.job)
            .filter(|job| !job.is_expired(now))
            .cloned()
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    pub async fn get_status(&self, id: JobId) -> Result<JobState, CoreError> {
        self.get_job(id).await.map(|job| job.state)
    }

    /// The result of a finished job.
    ///
    /// `NotReady` while the job is in flight, `JobFailed` for a failed job,
    /// `NotFound` for a dismissed job, an expired artifact or an unknown id.
    pub async fn get_result(&self, id: JobId) -> Result<Arc<ResultArtifact>, CoreError> {
        let job = self.get_job(id).await?;
        match job.state {
            JobState::Accepted | JobState::Running => Err(CoreError::NotReady { state: job.state }),
            JobState::Failed => Err(CoreError::JobFailed(job.error.unwrap_or_else(|| {
                JobError::new(JobErrorCode::ComputationError, "Job failed")
            }))),
            JobState::Dismissed => Err(result_not_found(id)),
            JobState::Successful => {
                let key = job.result_key.ok_or_else(|| result_not_found(id))?;
                match self.cache.get(key).await {
                    CacheLookup::Hit(artifact) => Ok(artifact),
                    CacheLookup::Expired | CacheLookup::Absent => Err(result_not_found(id)),
                }
            }
        }
    }

    /// The immutable request a job was created from.
    pub async fn request(&self, id: JobId) -> Result<Arc<ValidatedRequest>, CoreError> {
        let jobs = self.jobs.read().await;
        jobs.get(&id)
            .map(|r| Arc::clone(&r.request))
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    /// The cooperative cancellation token fired by [`dismiss`](Self::dismiss).
    pub async fn cancellation_token(&self, id: JobId) -> Result<CancellationToken, CoreError> {
        let jobs = self.jobs.read().await;
        jobs.get(&id)
            .map(|r| r.cancel.clone())
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    /// Live jobs matching `filter`, newest first.
    pub async fn list_jobs(&self, filter: &JobFilter) -> Vec<Job> {
        let now = self.clock.now();
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .map(|r| &r.job)
            .filter(|job| !job.is_expired(now))
            .filter(|job| filter.state.map_or(true, |s| job.state == s))
            .filter(|job| filter.process.map_or(true, |p| job.process == p))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs.into_iter()
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect()
    }

    pub async fn state_counts(&self) -> StateCounts {
        let now = self.clock.now();
        let mut counts = StateCounts::default();
        for record in self.jobs.read().await.values() {
            if !record.job.is_expired(now) {
                counts.add(record.job.state);
            }
        }
        counts
    }

    // -----------------------------------------------------------------------
    // Worker-facing updates
    // -----------------------------------------------------------------------

    /// Record progress of a running job. Returns `false` when the job is no
    /// longer running.
    pub async fn update_progress(
        &self,
        id: JobId,
        percent: u8,
        message: Option<String>,
    ) -> Result<bool, CoreError> {
        let process = {
            let mut jobs = self.jobs.write().await;
            let record = jobs.get_mut(&id).ok_or_else(|| CoreError::job_not_found(id))?;
            if record.job.state != JobState::Running {
                return Ok(false);
            }
            record.job.progress = Some(percent.min(100));
            if message.is_some() {
                record.job.message = message.clone();
            }
            record.job.updated_at = self.clock.now();
            record.job.process
        };
        self.events
            .publish(JobEvent::progress(id, process, percent.min(100), message));
        Ok(true)
    }

    /// Renew the lease of a running job. Returns `false` when the job is no
    /// longer running.
    pub async fn heartbeat(&self, id: JobId) -> Result<bool, CoreError> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(&id).ok_or_else(|| CoreError::job_not_found(id))?;
        if record.job.state != JobState::Running {
            return Ok(false);
        }
        record.lease_expires_at = Some(deadline_after(self.clock.now(), self.config.worker_lease));
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Dismissal
    // -----------------------------------------------------------------------

    /// Dismiss an `accepted` or `running` job.
    ///
    /// An accepted job is dismissed at once. A running job has its
    /// cancellation token fired; the worker acknowledges by moving the job to
    /// `dismissed`. Without an acknowledgement inside the configured timeout
    /// the registry dismisses the job itself.
    pub async fn dismiss(&self, id: JobId) -> Result<Job, CoreError> {
        match self
            .transition(
                id,
                &[JobState::Accepted],
                JobState::Dismissed,
                TransitionPayload::Error(JobError::new(
                    JobErrorCode::Dismissed,
                    "Dismissed before execution started",
                )),
            )
            .await
        {
            Ok(job) => {
                self.cancel_token(id).await;
                return Ok(job);
            }
            Err(CoreError::InvalidTransition {
                from: JobState::Running,
                ..
            }) => {}
            Err(e) => return Err(e),
        }

        // Subscribe before cancelling so the acknowledgement cannot be missed.
        let mut rx = self.events.subscribe();
        let token = self.cancellation_token(id).await?;
        let job = self.get_job(id).await?;
        if job.state.is_terminal() {
            return settle_dismissal(job);
        }

        tracing::info!(job_id = %id, "Cancelling running job");
        token.cancel();

        let ack = tokio::time::timeout(self.config.dismiss_ack_timeout, async {
            loop {
                match rx.recv().await {
                    Ok(event) if event.job_id == id && event.is_terminal() => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if self.get_status(id).await.map_or(true, JobState::is_terminal) {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
        .await;

        let job = self.get_job(id).await?;
        if job.state.is_terminal() {
            return settle_dismissal(job);
        }

        if ack.is_err() {
            tracing::warn!(
                job_id = %id,
                timeout_secs = self.config.dismiss_ack_timeout.as_secs(),
                "Worker did not acknowledge dismissal, dismissing job"
            );
        }
        match self
            .transition(
                id,
                &[JobState::Running],
                JobState::Dismissed,
                TransitionPayload::Error(JobError::new(
                    JobErrorCode::Dismissed,
                    "Dismissed while running",
                )),
            )
            .await
        {
            Ok(job) => Ok(job),
            Err(CoreError::InvalidTransition { .. }) => settle_dismissal(self.get_job(id).await?),
            Err(e) => Err(e),
        }
    }

    async fn cancel_token(&self, id: JobId) {
        if let Some(record) = self.jobs.read().await.get(&id) {
            record.cancel.cancel();
        }
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Fail every running job whose lease has expired with `worker_lost`.
    /// Returns the affected ids.
    pub async fn reap_expired_leases(&self) -> Vec<JobId> {
        let mut events = Vec::new();
        {
            let mut jobs = self.jobs.write().await;
            let now = self.clock.now();
            for record in jobs.values_mut() {
                let lost = record.job.state == JobState::Running
                    && record.lease_expires_at.is_some_and(|lease| lease <= now);
                if !lost {
                    continue;
                }
                let error = JobError::new(
                    JobErrorCode::WorkerLost,
                    "Worker stopped renewing its lease",
                );
                record.job.message = Some(error.message.clone());
                record.job.error = Some(error);
                self.apply(record, JobState::Failed, now);
                record.cancel.cancel();
                events.push(JobEvent::state_changed(
                    record.job.id,
                    record.job.process,
                    JobState::Running,
                    JobState::Failed,
                ));
            }
        }

        let ids: Vec<JobId> = events.iter().map(|e| e.job_id).collect();
        for event in events {
            tracing::warn!(job_id = %event.job_id, "Worker lease expired, job failed");
            self.events.publish(event);
        }
        ids
    }

    /// Remove terminal records past retention and expired cache entries.
    pub async fn sweep(&self) -> SweepReport {
        let expired: Vec<(JobId, Option<JobId>)> = {
            let mut jobs = self.jobs.write().await;
            let now = self.clock.now();
            let ids: Vec<(JobId, Option<JobId>)> = jobs
                .values()
                .filter(|r| r.job.is_expired(now))
                .map(|r| (r.job.id, r.job.result_key))
                .collect();
            for (id, _) in &ids {
                jobs.remove(id);
            }
            ids
        };

        let mut results_removed = 0;
        for key in expired.iter().filter_map(|(_, key)| *key) {
            if self.cache.invalidate(key).await {
                results_removed += 1;
            }
        }
        results_removed += self.cache.sweep().await;

        SweepReport {
            jobs_removed: expired.len(),
            results_removed,
        }
    }
}

fn result_not_found(id: JobId) -> CoreError {
    CoreError::NotFound {
        entity: "Result",
        id: id.to_string(),
    }
}

/// Resolve a dismissal against a job that already reached a terminal state.
fn settle_dismissal(job: Job) -> Result<Job, CoreError> {
    match job.state {
        JobState::Dismissed => Ok(job),
        from => Err(CoreError::InvalidTransition {
            from,
            to: JobState::Dismissed,
        }),
    }
}
