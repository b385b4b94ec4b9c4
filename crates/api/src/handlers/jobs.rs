//! Handlers for the `/jobs` resource.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use noise_core::error::CoreError;
use noise_core::job::JobState;
use noise_core::process::ProcessId;
use noise_core::types::JobId;
use noise_store::JobFilter;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::{results_response, JobList, Link, StatusInfo};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Query parameters for `GET /jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub status: Option<String>,
    #[serde(rename = "processID")]
    pub process_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl JobListQuery {
    fn into_filter(self) -> AppResult<JobFilter> {
        let state = self
            .status
            .map(|s| {
                JobState::parse(&s).ok_or_else(|| AppError::BadRequest(format!("Unknown job status '{s}'")))
            })
            .transpose()?;
        let process = self
            .process_id
            .map(|p| {
                ProcessId::parse(&p).ok_or_else(|| AppError::BadRequest(format!("Unknown process '{p}'")))
            })
            .transpose()?;

        Ok(JobFilter {
            state,
            process,
            limit: Some(self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)),
            offset: self.offset,
        })
    }
}

/// Parse a job id from the path. A malformed id names no job, so it
/// answers like an unknown one.
fn parse_job_id(raw: &str) -> AppResult<JobId> {
    raw.parse()
        .map_err(|_| AppError::Core(CoreError::job_not_found(raw)))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /jobs
///
/// Newest first. Supports `status`, `processID`, `limit` and `offset`.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<Json<JobList>> {
    let filter = params.into_filter()?;
    let jobs = state.registry.list_jobs(&filter).await;

    Ok(Json(JobList {
        jobs: jobs.iter().map(StatusInfo::from).collect(),
        links: vec![Link::new("/jobs", "self")],
    }))
}

// ---------------------------------------------------------------------------
// Status and results
// ---------------------------------------------------------------------------

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<StatusInfo> {
    let job_id = parse_job_id(&raw_id)?;
    let job = state.registry.get_job(job_id).await?;
    Ok(StatusInfo::from(&job))
}

/// GET /jobs/{id}/results
pub async fn get_results(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Response> {
    let job_id = parse_job_id(&raw_id)?;
    let artifact = state.registry.get_result(job_id).await?;
    Ok(results_response(&artifact))
}

// ---------------------------------------------------------------------------
// Dismiss
// ---------------------------------------------------------------------------

/// DELETE /jobs/{id}
///
/// Dismiss a queued or running job. Returns the job's final status;
/// a job that already finished answers 409.
pub async fn dismiss_job(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<StatusInfo> {
    let job_id = parse_job_id(&raw_id)?;
    let job = state.registry.dismiss(job_id).await?;
    tracing::info!(%job_id, "Job dismissed");
    Ok(StatusInfo::from(&job))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        let filter = JobListQuery {
            limit: Some(5000),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.limit, Some(MAX_LIMIT));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let query = JobListQuery {
            status: Some("paused".into()),
            ..Default::default()
        };
        assert!(matches!(query.into_filter(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn malformed_job_id_is_not_found() {
        assert!(matches!(
            parse_job_id("not-a-uuid"),
            Err(AppError::Core(CoreError::NotFound { entity: "Job", .. }))
        ));
        assert!(parse_job_id("0190b3d6-0000-7000-8000-000000000000").is_ok());
    }
}
