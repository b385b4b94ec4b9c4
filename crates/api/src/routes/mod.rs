pub mod health;
pub mod jobs;
pub mod processes;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the OGC API Processes route tree.
///
/// ```text
/// /                                   landing page
/// /conformance                        conformance classes
///
/// /processes                          process list
/// /processes/{id}                     process description
/// /processes/{id}/execution           execute (POST)
///
/// /jobs                               job list
/// /jobs/{id}                          status, dismiss (DELETE)
/// /jobs/{id}/results                  results
///
/// /queue                              queue depth
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::landing::landing_page))
        .route("/conformance", get(handlers::landing::conformance))
        .route("/queue", get(handlers::queue::queue_status))
        .nest("/processes", processes::router())
        .nest("/jobs", jobs::router())
}
