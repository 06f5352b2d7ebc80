//! Route definitions for the `/generation-jobs` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation_jobs;
use crate::state::AppState;

/// Routes mounted at `/generation-jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> submit_job
/// GET    /{id}            -> get_job
/// GET    /{id}/poll       -> poll_job
/// POST   /{id}/cancel     -> cancel_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(generation_jobs::list_jobs).post(generation_jobs::submit_job),
        )
        .route("/{id}", get(generation_jobs::get_job))
        .route("/{id}/poll", get(generation_jobs::poll_job))
        .route("/{id}/cancel", post(generation_jobs::cancel_job))
}
