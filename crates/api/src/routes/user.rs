//! Route definitions for the authenticated user's own settings.

use axum::routing::get;
use axum::Router;

use crate::handlers::notifications;
use crate::state::AppState;

/// Routes mounted at `/user`.
///
/// ```text
/// GET    /notification-preferences    -> get_preferences
/// PATCH  /notification-preferences    -> update_preferences
/// GET    /notifications               -> drain_notifications
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/notification-preferences",
            get(notifications::get_preferences).patch(notifications::update_preferences),
        )
        .route("/notifications", get(notifications::drain_notifications))
}
