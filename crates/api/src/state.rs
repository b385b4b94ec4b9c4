use std::sync::Arc;

use noise_core::clock::Clock;
use noise_events::EventBus;
use noise_store::{JobRegistry, ResultCache};
use noise_worker::{job_queue, QueueConsumer, QueueHandle};

use crate::config::ServerConfig;
use crate::engine::dispatcher::Dispatcher;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<JobRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    /// Producer side of the job queue, read for depth and capacity.
    pub queue: QueueHandle,
    pub event_bus: Arc<EventBus>,
    /// Number of in-process workers consuming the queue.
    pub worker_count: usize,
}

impl AppState {
    /// Wire the cache, registry, queue and dispatcher together. The returned
    /// consumer is handed to the worker pool.
    pub fn new(config: Arc<ServerConfig>, clock: Arc<dyn Clock>) -> (Self, QueueConsumer) {
        let orchestration = Arc::clone(&config.orchestration);
        let event_bus = Arc::new(EventBus::default());
        let cache = Arc::new(ResultCache::new(Arc::clone(&clock)));
        let registry = Arc::new(JobRegistry::new(
            Arc::clone(&orchestration),
            cache,
            Arc::clone(&event_bus),
            clock,
        ));
        let (queue, consumer) = job_queue(orchestration.queue_capacity);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            queue.clone(),
            Arc::clone(&orchestration),
        ));

        let state = Self {
            worker_count: orchestration.worker_concurrency,
            config,
            registry,
            dispatcher,
            queue,
            event_bus,
        };
        (state, consumer)
    }
}
