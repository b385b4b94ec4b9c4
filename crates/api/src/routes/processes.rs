use axum::routing::{get, post};
use axum::Router;

use crate::handlers::processes;
use crate::state::AppState;

/// Routes mounted at `/processes`.
///
/// ```text
/// GET    /                   -> list_processes
/// GET    /{id}               -> get_process
/// POST   /{id}/execution     -> execute
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(processes::list_processes))
        .route("/{id}", get(processes::get_process))
        .route("/{id}/execution", post(processes::execute))
}
