//! Route definitions for worker and embedding-subsystem callbacks.
//!
//! All endpoints require the `X-Worker-Token` header.

use axum::routing::{post, put};
use axum::Router;

use crate::handlers::worker;
use crate::state::AppState;

/// Routes mounted at `/internal`.
///
/// ```text
/// POST   /jobs/{id}/status               -> report_status
/// POST   /jobs/{id}/progress             -> report_progress
/// POST   /jobs/{id}/retry                -> report_retry
/// POST   /jobs/{id}/complete             -> report_complete
/// POST   /jobs/{id}/fail                 -> report_fail
/// POST   /jobs/{id}/cancelled            -> report_cancelled
/// PUT    /characters/{id}/vector-store   -> report_vector_store
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs/{id}/status", post(worker::report_status))
        .route("/jobs/{id}/progress", post(worker::report_progress))
        .route("/jobs/{id}/retry", post(worker::report_retry))
        .route("/jobs/{id}/complete", post(worker::report_complete))
        .route("/jobs/{id}/fail", post(worker::report_fail))
        .route("/jobs/{id}/cancelled", post(worker::report_cancelled))
        .route(
            "/characters/{id}/vector-store",
            put(worker::report_vector_store),
        )
}
