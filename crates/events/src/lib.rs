//! Job lifecycle notifications.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: one lifecycle notification (creation, a state change or a
//!   progress update).
//! - [`EventLogger`]: background task that writes every event to the log.

pub mod bus;
pub mod logger;

pub use bus::{EventBus, JobEvent, JobEventKind};
pub use logger::EventLogger;
