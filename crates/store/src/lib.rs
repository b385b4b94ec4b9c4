//! In-memory job state and result storage.
//!
//! [`JobRegistry`] owns every job record and is the only place a job's state
//! changes. [`ResultCache`] holds computed artifacts until their deadline.
//! Both are constructed explicitly and shared by `Arc`.

pub mod cache;
pub mod models;
pub mod registry;

pub use cache::ResultCache;
pub use models::artifact::{ArtifactPayload, CacheLookup, ResultArtifact};
pub use models::job::{Job, JobFilter, StateCounts};
pub use registry::{JobRegistry, SweepReport, TransitionPayload};
