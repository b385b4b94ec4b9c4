//! Integration tests for the health check, landing pages and general HTTP
//! behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, build_test_app, get};
use tower::ServiceExt;

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = build_test_app();
    let response = get(&app.router, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["workers"], 1);
    assert_eq!(json["queue_depth"], 0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app();
    let response = get(&app.router, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_test_app();
    let response = get(&app.router, "/health").await;

    let request_id = response.headers().get("x-request-id");
    assert!(
        request_id.is_some(),
        "Response must contain an x-request-id header"
    );
    let id_str = request_id.unwrap().to_str().unwrap();
    assert_eq!(id_str.len(), 36, "x-request-id should be a UUID string");
}

#[tokio::test]
async fn cors_preflight_allows_prefer_header() {
    let app = build_test_app();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/processes/traffic_noise_propagation/execution")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type,prefer")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn landing_page_links_to_processes_and_jobs() {
    let app = build_test_app();
    let json = body_json(get(&app.router, "/").await).await;

    let hrefs: Vec<&str> = json["links"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["href"].as_str())
        .collect();
    assert!(hrefs.contains(&"/processes"));
    assert!(hrefs.contains(&"/jobs"));
    assert!(hrefs.contains(&"/conformance"));
}

#[tokio::test]
async fn conformance_declares_dismiss_and_job_list() {
    let app = build_test_app();
    let json = body_json(get(&app.router, "/conformance").await).await;

    let classes = json["conformsTo"].as_array().unwrap();
    assert!(classes
        .iter()
        .any(|c| c.as_str().unwrap().ends_with("/conf/dismiss")));
    assert!(classes
        .iter()
        .any(|c| c.as_str().unwrap().ends_with("/conf/job-list")));
}

#[tokio::test]
async fn queue_reports_depth_and_capacity() {
    let app = build_test_app();
    let json = body_json(get(&app.router, "/queue").await).await;

    assert_eq!(json["depth"], 0);
    assert_eq!(json["capacity"], 16);
    assert_eq!(json["workers"], 1);
    assert_eq!(json["jobs"]["accepted"], 0);
}
