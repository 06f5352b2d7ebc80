//! Handlers for the caller's notification preferences and in-app toasts.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use quill_core::notification::UpdateNotificationPreferences;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/user/notification-preferences
pub async fn get_preferences(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let prefs = state.preferences.get_preferences(auth.user_id).await;
    Ok(Json(DataResponse { data: prefs }))
}

/// PATCH /api/v1/user/notification-preferences
///
/// Only the supplied fields change. `contact_email: null` clears the
/// override.
pub async fn update_preferences(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<UpdateNotificationPreferences>,
) -> AppResult<impl IntoResponse> {
    let prefs = state
        .preferences
        .update_preferences(auth.user_id, input)
        .await?;
    Ok(Json(DataResponse { data: prefs }))
}

/// GET /api/v1/user/notifications
///
/// Return and clear the caller's pending toasts, oldest first.
pub async fn drain_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let toasts = state.inbox.drain(auth.user_id).await;
    Ok(Json(DataResponse { data: toasts }))
}
