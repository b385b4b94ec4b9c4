#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use noise_api::config::ServerConfig;
use noise_api::router::build_app_router;
use noise_api::state::AppState;
use noise_core::clock::{Clock, ManualClock};
use noise_core::config::OrchestrationConfig;
use noise_core::job::JobState;
use noise_core::validation::ValidatedRequest;
use noise_store::ArtifactPayload;
use noise_worker::{ComputationEngine, ComputationError, ExecutionContext, WorkerPool};
use serde_json::{json, Value};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Orchestration settings with short limits for tests.
pub fn test_orchestration() -> OrchestrationConfig {
    OrchestrationConfig {
        sync_execution_timeout: Duration::from_secs(2),
        soft_time_limit: Duration::from_secs(5),
        hard_time_limit: Duration::from_secs(10),
        queue_capacity: 16,
        worker_concurrency: 1,
        dismiss_ack_timeout: Duration::from_secs(1),
        heartbeat_interval: Duration::from_millis(50),
        worker_lease: Duration::from_secs(5),
        ..OrchestrationConfig::default()
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(orchestration: OrchestrationConfig) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 1,
        engine_command: "true".to_string(),
        engine_args: Vec::new(),
        orchestration: Arc::new(orchestration),
    }
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

/// Returns a small FeatureCollection immediately.
pub struct EchoEngine;

#[async_trait]
impl ComputationEngine for EchoEngine {
    async fn execute(
        &self,
        request: &ValidatedRequest,
        _ctx: ExecutionContext,
    ) -> Result<ArtifactPayload, ComputationError> {
        Ok(ArtifactPayload::Inline(json!({
            "type": "FeatureCollection",
            "features": [],
            "buildings": request.building_count,
        })))
    }
}

/// Finishes after a delay unless dismissed first.
pub struct SlowEngine(pub Duration);

#[async_trait]
impl ComputationEngine for SlowEngine {
    async fn execute(
        &self,
        _request: &ValidatedRequest,
        ctx: ExecutionContext,
    ) -> Result<ArtifactPayload, ComputationError> {
        tokio::select! {
            _ = tokio::time::sleep(self.0) => Ok(ArtifactPayload::Inline(json!({"slow": true}))),
            _ = ctx.cancel.cancelled() => Err(ComputationError::Cancelled),
        }
    }
}

pub struct FailingEngine;

#[async_trait]
impl ComputationEngine for FailingEngine {
    async fn execute(
        &self,
        _request: &ValidatedRequest,
        _ctx: ExecutionContext,
    ) -> Result<ArtifactPayload, ComputationError> {
        Err(ComputationError::failed("receiver grid is empty"))
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub pool: WorkerPool,
}

/// Build the full application router, with the production middleware
/// stack, backed by a worker pool running `engine`.
pub fn spawn_app(orchestration: OrchestrationConfig, engine: impl ComputationEngine + 'static) -> TestApp {
    let config = Arc::new(test_config(orchestration));
    let clock = Arc::new(ManualClock::starting_now());
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let (state, consumer) = AppState::new(Arc::clone(&config), dyn_clock);

    let pool = WorkerPool::spawn(
        consumer,
        Arc::clone(&state.registry),
        Arc::new(engine),
        Arc::clone(&config.orchestration),
    );
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        clock,
        pool,
    }
}

pub fn build_test_app() -> TestApp {
    spawn_app(test_orchestration(), EchoEngine)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, &[]).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None, &[]).await
}

pub async fn post_json(app: &Router, uri: &str, body: &Value, headers: &[(&str, &str)]) -> Response<Body> {
    send(app, Method::POST, uri, Some(body), headers).await
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<&Value>,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `GET /jobs/{id}` until the job is terminal.
pub async fn wait_terminal(app: &Router, job_id: &str) -> Value {
    for _ in 0..400 {
        let status = body_json(get(app, &format!("/jobs/{job_id}")).await).await;
        let state = status["status"].as_str().and_then(JobState::parse);
        if state.is_some_and(JobState::is_terminal) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish");
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

pub fn execute_body(road_properties: Value) -> Value {
    json!({
        "inputs": {
            "buildings": {
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0, 0], [0, 10], [10, 10], [10, 0], [0, 0]]]
                    },
                    "properties": {"id": 1, "building_height": 12.5}
                }]
            },
            "roads": {
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {"type": "LineString", "coordinates": [[-5, -5], [20, -5]]},
                    "properties": road_properties
                }]
            },
            "crs": "http://www.opengis.net/def/crs/EPSG/0/25832"
        }
    })
}

pub fn valid_body() -> Value {
    execute_body(json!({"id": "r1", "light_vehicles_day": 500, "light_speed_day": 50}))
}

/// A valid body for the buildings process, which needs grid settings.
pub fn buildings_body() -> Value {
    let mut body = valid_body();
    body["inputs"]["building_grid_settings"] =
        json!({"grid_type": "BUILDINGS_2D", "receiver_distance": 2.0});
    body
}

pub const EXECUTE_URI: &str = "/processes/traffic_noise_propagation/execution";
