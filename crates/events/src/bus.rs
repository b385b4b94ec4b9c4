//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`JobEvent`]s. The registry
//! publishes every committed transition; the dispatcher's synchronous wait
//! and the dismissal acknowledgement wait subscribe to it. Share it via
//! `Arc<EventBus>`.

use chrono::Utc;
use noise_core::job::JobState;
use noise_core::process::ProcessId;
use noise_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    /// The job was created in `accepted`.
    Created,
    /// A transition was committed; `state` is the new state.
    StateChanged,
    /// A running job reported progress.
    Progress,
}

/// A job lifecycle notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub job_id: JobId,
    pub process: ProcessId,
    /// State after the event.
    pub state: JobState,
    /// State before a `StateChanged` event.
    pub previous: Option<JobState>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub timestamp: Timestamp,
}

impl JobEvent {
    pub fn created(job_id: JobId, process: ProcessId) -> Self {
        Self {
            kind: JobEventKind::Created,
            job_id,
            process,
            state: JobState::Accepted,
            previous: None,
            progress: None,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn state_changed(job_id: JobId, process: ProcessId, from: JobState, to: JobState) -> Self {
        Self {
            kind: JobEventKind::StateChanged,
            previous: Some(from),
            state: to,
            ..Self::created(job_id, process)
        }
    }

    pub fn progress(job_id: JobId, process: ProcessId, percent: u8, message: Option<String>) -> Self {
        Self {
            kind: JobEventKind::Progress,
            state: JobState::Running,
            progress: Some(percent),
            message,
            ..Self::created(job_id, process)
        }
    }

    /// Whether this event moved the job into a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.kind == JobEventKind::StateChanged && self.state.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use noise_events::bus::EventBus;
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
/// # drop(rx);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: JobEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
