use noise_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};

/// The computed output of a successful job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactPayload {
    /// The result document itself.
    Inline(serde_json::Value),
    /// A pointer to a result stored elsewhere.
    External { href: String, media_type: String },
}

/// A cached result. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultArtifact {
    pub job_id: JobId,
    pub payload: ArtifactPayload,
    pub produced_at: Timestamp,
    pub expires_at: Timestamp,
}

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    /// An entry exists but its deadline has passed.
    Expired,
    Absent,
}

impl<T> CacheLookup<T> {
    pub fn hit(self) -> Option<T> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Expired | CacheLookup::Absent => None,
        }
    }
}
