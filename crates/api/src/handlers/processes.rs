//! Handlers for the `/processes` resource.

use axum::extract::{Path, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use noise_core::error::CoreError;
use noise_core::job::{JobState, ResponseMode};
use noise_core::process::{self, ProcessDescription, ProcessId};
use noise_core::validation;
use serde::Serialize;
use serde_json::Value;

use crate::engine::dispatcher::Submission;
use crate::error::{AppError, AppResult};
use crate::response::{job_href, results_response, Link, StatusInfo};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn find_process(id: &str) -> AppResult<ProcessId> {
    ProcessId::parse(id).ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "Process",
            id: id.to_string(),
        })
    })
}

/// Response mode requested through `Prefer: respond-async` / `respond-sync`.
fn preferred_mode(headers: &HeaderMap) -> Option<ResponseMode> {
    headers
        .get_all("prefer")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .find_map(|pref| match pref.trim().to_ascii_lowercase().as_str() {
            "respond-async" => Some(ResponseMode::Async),
            "respond-sync" => Some(ResponseMode::Sync),
            _ => None,
        })
}

/// Response mode requested through the body's `mode` member. `auto` defers
/// to the server default.
fn body_mode(body: &Value) -> AppResult<Option<ResponseMode>> {
    match body.get("mode") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) if raw.eq_ignore_ascii_case("auto") => Ok(None),
        Some(Value::String(raw)) => ResponseMode::parse(raw)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown execution mode '{raw}'"))),
        Some(_) => Err(AppError::BadRequest("`mode` must be a string".into())),
    }
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ProcessList {
    pub processes: Vec<ProcessDescription>,
    pub links: Vec<Link>,
}

/// GET /processes
pub async fn list_processes() -> Json<ProcessList> {
    Json(ProcessList {
        processes: process::catalogue(),
        links: vec![Link::new("/processes", "self")],
    })
}

/// GET /processes/{id}
pub async fn get_process(Path(id): Path<String>) -> AppResult<Json<ProcessDescription>> {
    let process = find_process(&id)?;
    Ok(Json(process::describe(process)))
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

/// POST /processes/{id}/execution
///
/// Validates the body, creates a job and answers according to the response
/// mode: a synchronous execution that finishes in time returns the result
/// document (or the failed status), anything else returns `201 Created`
/// with the job's status and a `Location` header.
pub async fn execute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> AppResult<Response> {
    let process = find_process(&id)?;
    let mode = match preferred_mode(&headers) {
        Some(mode) => Some(mode),
        None => body_mode(&body)?,
    };

    let request = validation::validate(process, &body).map_err(|e| {
        tracing::info!(process_id = %process, violations = e.violations.len(), "Rejected invalid request");
        CoreError::from(e)
    })?;

    let submission = state.dispatcher.submit(request, mode).await?;
    match submission {
        Submission::Completed(job) if job.state == JobState::Successful => {
            let artifact = state.registry.get_result(job.id).await?;
            Ok(results_response(&artifact))
        }
        Submission::Completed(job) => Ok(StatusInfo::from(&job).into_response()),
        Submission::Pending(job) => Ok((
            StatusCode::CREATED,
            [(LOCATION, job_href(job.id))],
            StatusInfo::from(&job),
        )
            .into_response()),
    }
}
