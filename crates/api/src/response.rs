//! OGC API Processes response documents.
//!
//! Handlers answer with these types rather than ad-hoc `json!` values so
//! the wire shape is defined in one place.

use axum::response::{IntoResponse, Response};
use axum::Json;
use noise_core::job::{JobError, JobState};
use noise_core::types::{JobId, Timestamp};
use noise_store::{ArtifactPayload, Job, ResultArtifact};
use serde::Serialize;

pub const MEDIA_JSON: &str = "application/json";

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub href: String,
    pub rel: &'static str,
    #[serde(rename = "type")]
    pub media_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'static str>,
}

impl Link {
    pub fn new(href: impl Into<String>, rel: &'static str) -> Self {
        Self {
            href: href.into(),
            rel,
            media_type: MEDIA_JSON,
            title: None,
        }
    }

    pub fn titled(mut self, title: &'static str) -> Self {
        self.title = Some(title);
        self
    }
}

pub fn job_href(id: JobId) -> String {
    format!("/jobs/{id}")
}

/// The OGC `statusInfo` document for one job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    #[serde(rename = "jobID")]
    pub job_id: JobId,
    #[serde(rename = "processID")]
    pub process_id: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<Timestamp>,
    pub updated: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub links: Vec<Link>,
}

impl From<&Job> for StatusInfo {
    fn from(job: &Job) -> Self {
        let href = job_href(job.id);
        let mut links = vec![Link::new(href.clone(), "self").titled("Job status")];
        if job.state == JobState::Successful {
            links.push(
                Link::new(format!("{href}/results"), "http://www.opengis.net/def/rel/ogc/1.0/results")
                    .titled("Job results"),
            );
        }

        // A terminal error replaces the last progress message.
        let message = job
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .or_else(|| job.message.clone());

        Self {
            job_id: job.id,
            process_id: job.process.as_str(),
            kind: "process",
            status: job.state,
            message,
            created: job.created_at,
            started: job.started_at,
            finished: job.finished_at,
            updated: job.updated_at,
            progress: job.progress,
            error: job.error.clone(),
            links,
        }
    }
}

impl IntoResponse for StatusInfo {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// `GET /jobs` document.
#[derive(Debug, Serialize)]
pub struct JobList {
    pub jobs: Vec<StatusInfo>,
    pub links: Vec<Link>,
}

/// The result document of a successful job.
///
/// Inline payloads are returned as-is; external payloads as a link object.
pub fn results_response(artifact: &ResultArtifact) -> Response {
    match &artifact.payload {
        ArtifactPayload::Inline(document) => Json(document.clone()).into_response(),
        ArtifactPayload::External { href, media_type } => Json(serde_json::json!({
            "href": href,
            "type": media_type,
            "rel": "http://www.opengis.net/def/rel/ogc/1.0/results",
        }))
        .into_response(),
    }
}
