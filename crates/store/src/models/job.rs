use std::sync::Arc;

use noise_core::job::{JobError, JobState};
use noise_core::process::ProcessId;
use noise_core::types::{JobId, Timestamp};
use noise_core::validation::ValidatedRequest;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Point-in-time snapshot of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub process: ProcessId,
    pub fingerprint: String,
    pub state: JobState,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    /// Percent complete, 0 to 100.
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub error: Option<JobError>,
    /// Key of the job's artifact in the result cache.
    pub result_key: Option<JobId>,
    /// When the terminal record stops being queryable.
    pub expires_at: Option<Timestamp>,
}

impl Job {
    /// A terminal record past its retention deadline reads as absent.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Registry-internal record: the snapshot plus what only workers need.
pub(crate) struct JobRecord {
    pub job: Job,
    pub request: Arc<ValidatedRequest>,
    pub cancel: CancellationToken,
    pub lease_expires_at: Option<Timestamp>,
}

/// Listing filter for [`JobRegistry::list_jobs`](crate::JobRegistry::list_jobs).
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub state: Option<JobState>,
    pub process: Option<ProcessId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Number of live jobs in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub accepted: usize,
    pub running: usize,
    pub successful: usize,
    pub failed: usize,
    pub dismissed: usize,
}

impl StateCounts {
    pub fn add(&mut self, state: JobState) {
        let slot = match state {
            JobState::Accepted => &mut self.accepted,
            JobState::Running => &mut self.running,
            JobState::Successful => &mut self.successful,
            JobState::Failed => &mut self.failed,
            JobState::Dismissed => &mut self.dismissed,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.accepted + self.running + self.successful + self.failed + self.dismissed
    }
}
