//! Domain logic shared by every noise-processes crate.
//!
//! Nothing in here performs I/O: the job state machine, the orchestration
//! configuration, the process catalogue and the input validator are all
//! pure, so the registry, the workers and the HTTP layer can agree on the
//! same rules without depending on each other.

pub mod clock;
pub mod config;
pub mod error;
pub mod hashing;
pub mod job;
pub mod process;
pub mod types;
pub mod validation;
