pub mod characters;
pub mod generation_jobs;
pub mod health;
pub mod internal;
pub mod user;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generation-jobs                                 list, submit
/// /generation-jobs/{id}                            get
/// /generation-jobs/{id}/poll                       poll (202/200/500/409)
/// /generation-jobs/{id}/cancel                     cancel
///
/// /characters/{id}/vector-store                    readiness
///
/// /user/notification-preferences                   get, patch
/// /user/notifications                              drain in-app toasts
///
/// /internal/jobs/{id}/status                       worker: pending | in_progress
/// /internal/jobs/{id}/progress                     worker: progress
/// /internal/jobs/{id}/retry                        worker: transient retry
/// /internal/jobs/{id}/complete                     worker: completed
/// /internal/jobs/{id}/fail                         worker: failed
/// /internal/jobs/{id}/cancelled                    worker: cancelled on its side
/// /internal/characters/{id}/vector-store           embedding subsystem status (PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/generation-jobs", generation_jobs::router())
        .nest("/characters", characters::router())
        .nest("/user", user::router())
        .nest("/internal", internal::router())
}
