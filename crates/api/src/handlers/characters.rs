//! Handlers for character readiness.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use quill_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/characters/{id}/vector-store
///
/// Current vector store status and whether generation can start.
pub async fn get_vector_store(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(character_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let status = state.readiness.check_readiness(character_id).await?;
    Ok(Json(DataResponse { data: status }))
}
