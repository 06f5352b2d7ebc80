//! Route definitions for the `/characters` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::characters;
use crate::state::AppState;

/// Routes mounted at `/characters`.
///
/// ```text
/// GET    /{id}/vector-store    -> get_vector_store
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/vector-store", get(characters::get_vector_store))
}
