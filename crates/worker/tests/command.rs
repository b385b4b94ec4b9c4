#![cfg(unix)]

use std::time::Duration;

use assert_matches::assert_matches;
use noise_core::process::{OutputId, ProcessId};
use noise_core::validation::ValidatedRequest;
use noise_store::ArtifactPayload;
use noise_worker::{CommandEngine, ComputationEngine, ComputationError, ExecutionContext, ProgressReporter};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn request() -> ValidatedRequest {
    ValidatedRequest {
        process: ProcessId::TrafficNoisePropagation,
        inputs: json!({"roads": {"type": "FeatureCollection", "features": []}}),
        outputs: vec![OutputId::NoiseDay],
        fingerprint: "a".repeat(64),
        building_count: 0,
        road_count: 0,
    }
}

fn context() -> (ExecutionContext, tokio::sync::mpsc::UnboundedReceiver<noise_worker::Progress>) {
    let (progress, rx) = ProgressReporter::channel();
    (
        ExecutionContext {
            job_id: uuid::Uuid::now_v7(),
            cancel: CancellationToken::new(),
            soft_limit: CancellationToken::new(),
            progress,
        },
        rx,
    )
}

fn sh(script: &str) -> CommandEngine {
    CommandEngine::new("sh", vec!["-c".to_string(), script.to_string()])
}

#[tokio::test]
async fn stdout_document_becomes_inline_result() {
    let engine = sh(r#"cat > /dev/null; echo '{"type":"FeatureCollection","features":[]}'"#);
    let (ctx, _rx) = context();
    let payload = engine.execute(&request(), ctx).await.unwrap();
    assert_eq!(
        payload,
        ArtifactPayload::Inline(json!({"type": "FeatureCollection", "features": []}))
    );
}

#[tokio::test]
async fn request_is_written_to_stdin() {
    // Echo the request back: the result is the request document.
    let engine = sh("cat");
    let (ctx, _rx) = context();
    let payload = engine.execute(&request(), ctx).await.unwrap();
    let ArtifactPayload::Inline(doc) = payload else {
        panic!("expected inline payload");
    };
    assert_eq!(doc["process"], "traffic_noise_propagation");
    assert_eq!(doc["outputs"], json!(["noise_day"]));
}

#[tokio::test]
async fn stderr_progress_lines_are_reported() {
    let engine = sh("cat > /dev/null; echo 'PROGRESS 30 building receivers' >&2; echo '{}'");
    let (ctx, mut rx) = context();
    engine.execute(&request(), ctx).await.unwrap();
    let progress = rx.recv().await.unwrap();
    assert_eq!(progress.percent, 30);
    assert_eq!(progress.message.as_deref(), Some("building receivers"));
}

#[tokio::test]
async fn non_zero_exit_is_a_failure_with_stderr() {
    let engine = sh("cat > /dev/null; echo 'missing DEM tile' >&2; exit 3");
    let (ctx, _rx) = context();
    let err = engine.execute(&request(), ctx).await.unwrap_err();
    assert_matches!(err, ComputationError::Failed { details: Some(details), .. } => {
        assert_eq!(details["exit_code"], 3);
        assert_eq!(details["stderr"], json!(["missing DEM tile"]));
    });
}

#[tokio::test]
async fn garbage_output_is_invalid() {
    let engine = sh("cat > /dev/null; echo 'not json'");
    let (ctx, _rx) = context();
    assert_matches!(
        engine.execute(&request(), ctx).await,
        Err(ComputationError::InvalidOutput(_))
    );
}

#[tokio::test]
async fn cancellation_kills_the_child() {
    let engine = sh("sleep 30");
    let (ctx, _rx) = context();
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), engine.execute(&request(), ctx))
        .await
        .expect("engine should stop promptly");
    assert_matches!(result, Err(ComputationError::Cancelled));
}

#[tokio::test]
async fn missing_program_is_an_io_error() {
    let engine = CommandEngine::new("/nonexistent/noise-engine", vec![]);
    let (ctx, _rx) = context();
    assert_matches!(
        engine.execute(&request(), ctx).await,
        Err(ComputationError::Io(_))
    );
}
