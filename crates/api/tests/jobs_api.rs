//! Integration tests for the `/jobs` resource.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use common::{
    body_json, buildings_body, delete, get, post_json, spawn_app, test_orchestration, valid_body,
    wait_terminal, EchoEngine, FailingEngine, SlowEngine, EXECUTE_URI,
};
use noise_core::config::OrchestrationConfig;
use serde_json::Value;

fn no_workers() -> OrchestrationConfig {
    OrchestrationConfig {
        worker_concurrency: 0,
        ..test_orchestration()
    }
}

/// Submit asynchronously and return the job id.
async fn submit(app: &Router, uri: &str) -> String {
    submit_body(app, uri, &valid_body()).await
}

async fn submit_body(app: &Router, uri: &str, body: &Value) -> String {
    let response = post_json(app, uri, body, &[("prefer", "respond-async")]).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["jobID"].as_str().unwrap().to_string()
}

fn job_ids(list: &Value) -> Vec<&str> {
    list["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["jobID"].as_str().unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_is_404() {
    let app = spawn_app(test_orchestration(), EchoEngine);
    let response = get(&app.router, "/jobs/0190b3d6-0000-7000-8000-000000000000").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_job_id_answers_like_an_unknown_job() {
    let app = spawn_app(test_orchestration(), EchoEngine);

    for uri in ["/jobs/not-a-uuid", "/jobs/not-a-uuid/results"] {
        let response = get(&app.router, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }

    let response = delete(&app.router, "/jobs/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn successful_status_links_to_results() {
    let app = spawn_app(test_orchestration(), EchoEngine);
    let id = submit(&app.router, EXECUTE_URI).await;

    let status = wait_terminal(&app.router, &id).await;
    let rels: Vec<&str> = status["links"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["rel"].as_str().unwrap())
        .collect();
    assert!(rels.contains(&"http://www.opengis.net/def/rel/ogc/1.0/results"));
    assert!(status["started"].is_string());
    assert!(status["finished"].is_string());
}

#[tokio::test]
async fn terminal_record_expires_after_retention() {
    let app = spawn_app(test_orchestration(), EchoEngine);
    let id = submit(&app.router, EXECUTE_URI).await;
    wait_terminal(&app.router, &id).await;

    app.clock.advance(chrono::Duration::days(8));
    let response = get(&app.router, &format!("/jobs/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[tokio::test]
async fn results_of_queued_job_are_not_ready() {
    let app = spawn_app(no_workers(), EchoEngine);
    let id = submit(&app.router, EXECUTE_URI).await;

    let response = get(&app.router, &format!("/jobs/{id}/results")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "RESULT_NOT_READY");
}

#[tokio::test]
async fn results_of_failed_job_report_the_error() {
    let app = spawn_app(test_orchestration(), FailingEngine);
    let id = submit(&app.router, EXECUTE_URI).await;
    wait_terminal(&app.router, &id).await;

    let response = get(&app.router, &format!("/jobs/{id}/results")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["code"], "JOB_FAILED");
    assert_eq!(json["details"]["code"], "computation_error");
}

// ---------------------------------------------------------------------------
// Dismiss
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dismissing_a_queued_job() {
    let app = spawn_app(no_workers(), EchoEngine);
    let id = submit(&app.router, EXECUTE_URI).await;

    let response = delete(&app.router, &format!("/jobs/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "dismissed");

    let response = get(&app.router, &format!("/jobs/{id}/results")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dismissing_a_running_job() {
    let app = spawn_app(test_orchestration(), SlowEngine(Duration::from_secs(30)));
    let id = submit(&app.router, EXECUTE_URI).await;

    loop {
        let status = body_json(get(&app.router, &format!("/jobs/{id}")).await).await;
        if status["status"] == "running" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let response = delete(&app.router, &format!("/jobs/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "dismissed");
    assert_eq!(json["error"]["code"], "dismissed");
}

#[tokio::test]
async fn dismissing_a_successful_job_conflicts() {
    let app = spawn_app(test_orchestration(), EchoEngine);
    let id = submit(&app.router, EXECUTE_URI).await;
    wait_terminal(&app.router, &id).await;

    let response = delete(&app.router, &format!("/jobs/{id}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INVALID_TRANSITION");

    let status = body_json(get(&app.router, &format!("/jobs/{id}")).await).await;
    assert_eq!(status["status"], "successful");
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_filters_by_status_and_process() {
    let app = spawn_app(no_workers(), EchoEngine);
    let first = submit(&app.router, EXECUTE_URI).await;
    let second = submit_body(
        &app.router,
        "/processes/traffic_noise_buildings/execution",
        &buildings_body(),
    )
    .await;
    delete(&app.router, &format!("/jobs/{first}")).await;

    let all = body_json(get(&app.router, "/jobs").await).await;
    assert_eq!(job_ids(&all).len(), 2);

    let dismissed = body_json(get(&app.router, "/jobs?status=dismissed").await).await;
    assert_eq!(job_ids(&dismissed), vec![first.as_str()]);

    let buildings = body_json(get(&app.router, "/jobs?processID=traffic_noise_buildings").await).await;
    assert_eq!(job_ids(&buildings), vec![second.as_str()]);

    let limited = body_json(get(&app.router, "/jobs?limit=1").await).await;
    assert_eq!(job_ids(&limited).len(), 1);
}

#[tokio::test]
async fn list_rejects_unknown_status() {
    let app = spawn_app(test_orchestration(), EchoEngine);
    let response = get(&app.router, "/jobs?status=paused").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}
