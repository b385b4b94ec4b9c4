//! [`ComputationEngine`] that runs an external program per job.
//!
//! Protocol:
//! - the [`ValidatedRequest`] is written to the child's stdin as JSON;
//! - the result document is read from stdout as JSON. An OGC link object
//!   `{"href": ..., "type": ...}` is stored as an external reference,
//!   anything else inline;
//! - lines `PROGRESS <percent> [message]` on stderr become job progress;
//!   other stderr lines are kept and attached to a failure;
//! - a non-zero exit status fails the job.
//!
//! The child is killed when the job is dismissed and whenever the execution
//! future is dropped, which is how the hard time limit takes effect.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use noise_core::validation::ValidatedRequest;
use noise_store::ArtifactPayload;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::engine::{ComputationEngine, ComputationError, ExecutionContext, ProgressReporter};

/// Number of non-progress stderr lines kept for error details.
const STDERR_TAIL_LINES: usize = 20;

pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

enum Wait {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    SoftLimit,
}

#[async_trait]
impl ComputationEngine for CommandEngine {
    async fn execute(
        &self,
        request: &ValidatedRequest,
        ctx: ExecutionContext,
    ) -> Result<ArtifactPayload, ComputationError> {
        let input = serde_json::to_vec(request)
            .map_err(|e| ComputationError::failed(format!("Failed to encode request: {e}")))?;

        tracing::debug!(
            job_id = %ctx.job_id,
            program = %self.program,
            "Starting engine process"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("NOISE_JOB_ID", ctx.job_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(mut stdin), Some(mut stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(ComputationError::failed("Engine process pipes unavailable"));
        };

        let writer = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        });
        let reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        });
        let progress = ctx.progress.clone();
        let stderr_task = tokio::spawn(async move { collect_stderr(stderr, progress).await });

        let mut soft_noted = false;
        let status = loop {
            let wait = tokio::select! {
                status = child.wait() => Wait::Exited(status),
                _ = ctx.cancel.cancelled() => Wait::Cancelled,
                _ = ctx.soft_limit.cancelled(), if !soft_noted => Wait::SoftLimit,
            };
            match wait {
                Wait::Exited(status) => break status?,
                Wait::Cancelled => {
                    tracing::info!(job_id = %ctx.job_id, "Killing engine process");
                    let _ = child.kill().await;
                    return Err(ComputationError::Cancelled);
                }
                Wait::SoftLimit => {
                    soft_noted = true;
                    tracing::warn!(job_id = %ctx.job_id, "Engine process passed the soft time limit");
                }
            }
        };

        // The child may exit without reading all of its input.
        if let Ok(Err(e)) = writer.await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                tracing::warn!(job_id = %ctx.job_id, error = %e, "Failed to write engine input");
            }
        }
        let output = reader
            .await
            .map_err(|e| ComputationError::failed(format!("Engine output reader failed: {e}")))??;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(ComputationError::Failed {
                message: format!("Engine exited with {status}"),
                details: Some(json!({
                    "exit_code": status.code(),
                    "stderr": stderr_tail,
                })),
            });
        }

        let document: Value = serde_json::from_slice(&output)
            .map_err(|e| ComputationError::InvalidOutput(e.to_string()))?;
        Ok(into_payload(document))
    }
}

async fn collect_stderr(
    stderr: tokio::process::ChildStderr,
    progress: ProgressReporter,
) -> Vec<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_progress_line(&line) {
            Some((percent, message)) => progress.report(percent, message),
            None => {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
    }
    tail.into()
}

/// Parse `PROGRESS <percent> [message]`.
pub fn parse_progress_line(line: &str) -> Option<(u8, Option<String>)> {
    let rest = line.trim().strip_prefix("PROGRESS ")?;
    let (number, message) = match rest.split_once(char::is_whitespace) {
        Some((number, message)) => (number, Some(message.trim().to_string())),
        None => (rest, None),
    };
    let percent: f64 = number.parse().ok()?;
    if !percent.is_finite() {
        return None;
    }
    let message = message.filter(|m| !m.is_empty());
    Some((percent.clamp(0.0, 100.0).round() as u8, message))
}

fn into_payload(document: Value) -> ArtifactPayload {
    if let Value::Object(map) = &document {
        if map.len() == 2 {
            if let (Some(Value::String(href)), Some(Value::String(media_type))) =
                (map.get("href"), map.get("type"))
            {
                return ArtifactPayload::External {
                    href: href.clone(),
                    media_type: media_type.clone(),
                };
            }
        }
    }
    ArtifactPayload::Inline(document)
}
