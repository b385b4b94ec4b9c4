use crate::job::{JobError, JobState};
use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("Job is {state}; results are not ready")]
    NotReady { state: JobState },

    #[error("Job failed: {}", .0.message)]
    JobFailed(JobError),

    #[error("Service busy: {0}")]
    Busy(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn job_not_found(id: impl ToString) -> Self {
        CoreError::NotFound {
            entity: "Job",
            id: id.to_string(),
        }
    }
}
