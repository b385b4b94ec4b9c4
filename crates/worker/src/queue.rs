//! Bounded FIFO of job ids between the dispatcher and the workers.
//!
//! Producers reserve a slot before creating a job so a full queue is
//! reported as backpressure without leaving an orphaned `accepted` job.
//! The current depth is the number of ids sent but not yet received; it is
//! what an external autoscaler polls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use noise_core::error::CoreError;
use noise_core::types::JobId;
use tokio::sync::{mpsc, Mutex};

/// Create a queue holding at most `capacity` ids.
pub fn job_queue(capacity: usize) -> (QueueHandle, QueueConsumer) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let depth = Arc::new(AtomicUsize::new(0));
    (
        QueueHandle {
            sender,
            depth: Arc::clone(&depth),
            capacity: capacity.max(1),
        },
        QueueConsumer {
            receiver: Arc::new(Mutex::new(receiver)),
            depth,
        },
    )
}

/// Producer side, cloned into every request handler.
#[derive(Clone)]
pub struct QueueHandle {
    sender: mpsc::Sender<JobId>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

impl QueueHandle {
    /// Reserve room for one id without waiting.
    pub fn try_reserve(&self) -> Result<QueueSlot, CoreError> {
        match self.sender.clone().try_reserve_owned() {
            Ok(permit) => Ok(QueueSlot {
                permit,
                depth: Arc::clone(&self.depth),
            }),
            Err(mpsc::error::TrySendError::Full(_)) => Err(CoreError::Busy(format!(
                "job queue is full ({} queued)",
                self.capacity
            ))),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(CoreError::Busy("job queue is shut down".into()))
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A reserved queue slot. Dropping it unused releases the room.
#[derive(Debug)]
pub struct QueueSlot {
    permit: mpsc::OwnedPermit<JobId>,
    depth: Arc<AtomicUsize>,
}

impl QueueSlot {
    pub fn send(self, id: JobId) {
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.permit.send(id);
    }
}

/// Consumer side, shared by every worker of the pool.
#[derive(Clone)]
pub struct QueueConsumer {
    receiver: Arc<Mutex<mpsc::Receiver<JobId>>>,
    depth: Arc<AtomicUsize>,
}

impl QueueConsumer {
    /// Wait for the next id. `None` once every producer is gone and the
    /// queue is drained.
    pub async fn recv(&self) -> Option<JobId> {
        let id = self.receiver.lock().await.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(id)
    }
}
