//! Tests for the sync/async dispatch decision, without the HTTP layer.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{spawn_app, test_orchestration, valid_body, EchoEngine, SlowEngine};
use noise_api::engine::dispatcher::Submission;
use noise_core::config::OrchestrationConfig;
use noise_core::error::CoreError;
use noise_core::job::{JobState, ResponseMode};
use noise_core::process::ProcessId;
use noise_core::validation::{validate, ValidatedRequest};
use noise_store::JobFilter;

fn request() -> ValidatedRequest {
    validate(ProcessId::TrafficNoisePropagation, &valid_body()).unwrap()
}

#[tokio::test]
async fn async_submission_returns_accepted_job() {
    let app = spawn_app(
        OrchestrationConfig {
            worker_concurrency: 0,
            ..test_orchestration()
        },
        EchoEngine,
    );

    let submission = app
        .state
        .dispatcher
        .submit(request(), Some(ResponseMode::Async))
        .await
        .unwrap();

    assert_matches!(&submission, Submission::Pending(job) if job.state == JobState::Accepted);
    assert_eq!(app.state.queue.depth(), 1);
}

#[tokio::test]
async fn default_mode_applies_without_preference() {
    let app = spawn_app(
        OrchestrationConfig {
            default_response_mode: ResponseMode::Sync,
            ..test_orchestration()
        },
        EchoEngine,
    );

    let submission = app.state.dispatcher.submit(request(), None).await.unwrap();
    assert_matches!(submission, Submission::Completed(job) if job.state == JobState::Successful);
}

#[tokio::test]
async fn sync_submission_completes_within_bound() {
    let app = spawn_app(test_orchestration(), EchoEngine);

    let submission = app
        .state
        .dispatcher
        .submit(request(), Some(ResponseMode::Sync))
        .await
        .unwrap();

    let Submission::Completed(job) = submission else {
        panic!("expected a completed submission");
    };
    assert_eq!(job.state, JobState::Successful);
    assert!(app.state.registry.get_result(job.id).await.is_ok());
}

#[tokio::test]
async fn sync_timeout_leaves_the_job_running() {
    let app = spawn_app(
        OrchestrationConfig {
            sync_execution_timeout: Duration::from_millis(50),
            ..test_orchestration()
        },
        SlowEngine(Duration::from_millis(300)),
    );

    let submission = app
        .state
        .dispatcher
        .submit(request(), Some(ResponseMode::Sync))
        .await
        .unwrap();
    let Submission::Pending(job) = submission else {
        panic!("expected a pending submission");
    };

    let registry = Arc::clone(&app.state.registry);
    let mut state = registry.get_status(job.id).await.unwrap();
    while !state.is_terminal() {
        tokio::time::sleep(Duration::from_millis(10)).await;
        state = registry.get_status(job.id).await.unwrap();
    }
    assert_eq!(state, JobState::Successful);
}

#[tokio::test]
async fn full_queue_is_busy_and_creates_no_job() {
    let app = spawn_app(
        OrchestrationConfig {
            queue_capacity: 1,
            worker_concurrency: 0,
            ..test_orchestration()
        },
        EchoEngine,
    );
    let dispatcher = &app.state.dispatcher;

    dispatcher.submit(request(), Some(ResponseMode::Async)).await.unwrap();
    assert_matches!(
        dispatcher.submit(request(), Some(ResponseMode::Sync)).await,
        Err(CoreError::Busy(_))
    );

    let jobs = app.state.registry.list_jobs(&JobFilter::default()).await;
    assert_eq!(jobs.len(), 1);
}
