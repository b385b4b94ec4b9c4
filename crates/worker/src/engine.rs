//! The boundary to whatever performs the noise calculation.

use async_trait::async_trait;
use noise_core::job::{JobError, JobErrorCode};
use noise_core::types::JobId;
use noise_core::validation::ValidatedRequest;
use noise_store::ArtifactPayload;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum ComputationError {
    #[error("{message}")]
    Failed {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid engine output: {0}")]
    InvalidOutput(String),
}

impl ComputationError {
    pub fn failed(message: impl Into<String>) -> Self {
        ComputationError::Failed {
            message: message.into(),
            details: None,
        }
    }

    /// The error detail stored on the failed job.
    pub fn into_job_error(self) -> JobError {
        match self {
            ComputationError::Failed { message, details } => {
                let error = JobError::new(JobErrorCode::ComputationError, message);
                match details {
                    Some(details) => error.with_details(details),
                    None => error,
                }
            }
            other => JobError::new(JobErrorCode::ComputationError, other.to_string()),
        }
    }
}

/// A progress report from a running engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: u8,
    pub message: Option<String>,
}

/// Handed to the engine to report progress. Reports are forwarded to the
/// registry by the worker; they are dropped once the job has finished.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<Progress>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Progress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn report(&self, percent: u8, message: Option<String>) {
        let _ = self.tx.send(Progress {
            percent: percent.min(100),
            message,
        });
    }
}

/// Everything an engine gets besides the request.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub job_id: JobId,
    /// Fired when the job is dismissed. Engines should stop promptly.
    pub cancel: CancellationToken,
    /// Fired at the soft time limit. Advisory: the engine should wrap up.
    pub soft_limit: CancellationToken,
    pub progress: ProgressReporter,
}

/// Performs the calculation for one validated request.
#[async_trait]
pub trait ComputationEngine: Send + Sync {
    async fn execute(
        &self,
        request: &ValidatedRequest,
        ctx: ExecutionContext,
    ) -> Result<ArtifactPayload, ComputationError>;
}
