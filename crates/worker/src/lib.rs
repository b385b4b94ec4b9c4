//! Job execution: the bounded work queue, the computation engine seam and
//! the in-process worker pool that drives jobs from `running` to a terminal
//! state.

pub mod command;
pub mod engine;
pub mod pool;
pub mod queue;
pub mod worker;

pub use command::CommandEngine;
pub use engine::{ComputationEngine, ComputationError, ExecutionContext, Progress, ProgressReporter};
pub use pool::WorkerPool;
pub use queue::{job_queue, QueueConsumer, QueueHandle, QueueSlot};
pub use worker::Worker;
