//! Job lifecycle states and the transition graph.
//!
//! ```text
//! accepted -> running -> successful
//!     |          |-----> failed
//!     |          '-----> dismissed
//!     '----------------> dismissed
//! ```
//!
//! The registry is the only component allowed to apply a transition; this
//! module only answers whether an edge exists.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Lifecycle state of a job, serialized as the OGC `statusCode` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Accepted,
    Running,
    Successful,
    Failed,
    Dismissed,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Accepted,
        JobState::Running,
        JobState::Successful,
        JobState::Failed,
        JobState::Dismissed,
    ];

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Successful | JobState::Failed | JobState::Dismissed
        )
    }

    /// States reachable in one step from `self`.
    pub fn valid_transitions(self) -> &'static [JobState] {
        match self {
            JobState::Accepted => &[JobState::Running, JobState::Dismissed],
            JobState::Running => &[
                JobState::Successful,
                JobState::Failed,
                JobState::Dismissed,
            ],
            JobState::Successful | JobState::Failed | JobState::Dismissed => &[],
        }
    }

    /// Check whether the edge `self -> to` exists.
    pub fn can_transition(self, to: JobState) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Accepted => "accepted",
            JobState::Running => "running",
            JobState::Successful => "successful",
            JobState::Failed => "failed",
            JobState::Dismissed => "dismissed",
        }
    }

    /// Parse the lowercase wire name (used by `?status=` filters).
    pub fn parse(value: &str) -> Option<JobState> {
        JobState::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Response mode
// ---------------------------------------------------------------------------

/// Caller preference for how a process execution is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Wait (bounded) for the job to finish and answer with the result.
    Sync,
    /// Answer immediately with a job handle.
    Async,
}

impl ResponseMode {
    pub fn parse(value: &str) -> Option<ResponseMode> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sync" => Some(ResponseMode::Sync),
            "async" => Some(ResponseMode::Async),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Terminal error detail
// ---------------------------------------------------------------------------

/// Reason code carried by a `failed` or `dismissed` job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorCode {
    /// The computation engine reported a failure.
    ComputationError,
    /// The hard task time limit elapsed.
    Timeout,
    /// The worker stopped renewing its lease while the job was running.
    WorkerLost,
    /// The job was dismissed by a client.
    Dismissed,
}

/// Error detail stored on a terminal job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub code: JobErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl JobError {
    pub fn new(code: JobErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
