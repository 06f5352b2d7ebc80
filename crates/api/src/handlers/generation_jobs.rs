//! Handlers for the `/generation-jobs` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Users only ever
//! see and act on their own jobs.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use quill_core::error::CoreError;
use quill_core::generation_job::{JobStatus, JobView, NewGenerationJob};
use quill_core::types::{DbId, Timestamp};
use quill_registry::JobListQuery;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of a cancel response.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub job_id: DbId,
    pub status: JobStatus,
    pub cancelled_at: Option<Timestamp>,
    /// `true` when the job had already finished; nothing was changed.
    pub already_terminal: bool,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/generation-jobs
///
/// Submit a chapter generation. Returns 201 with the queued job, or 409
/// `NOT_READY` with the character's vector store status.
pub async fn submit_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<NewGenerationJob>,
) -> AppResult<impl IntoResponse> {
    let job = state.registry.create_job(auth.user_id, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: JobView::new(job, Utc::now()),
        }),
    ))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/generation-jobs
///
/// List the caller's jobs, newest first. Supports `status`, `limit`,
/// `offset` and `refresh` query parameters.
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let list = state.job_list.list_jobs(auth.user_id, &params).await;
    Ok(Json(DataResponse { data: list }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/generation-jobs/{id}
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.registry.get_job(job_id, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: JobView::new(job, Utc::now()),
    }))
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// GET /api/v1/generation-jobs/{id}/poll
///
/// The status code encodes the job state: 202 while running, 200 on
/// completion, 500 on failure and 409 once cancelled. The body is the bare
/// poll payload.
pub async fn poll_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let poll = state.registry.poll(job_id, auth.user_id).await?;
    let status = StatusCode::from_u16(poll.status_code)
        .map_err(|e| AppError::InternalError(format!("Bad poll status code: {e}")))?;
    Ok((status, Json(poll.payload)))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/generation-jobs/{id}/cancel
///
/// Cancel a live job. A job that already finished is reported with
/// `already_terminal: true` rather than as an error.
pub async fn cancel_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let response = match state.registry.cancel(job_id, auth.user_id).await {
        Ok(result) => CancelResponse {
            job_id: result.job_id,
            status: result.status,
            cancelled_at: Some(result.cancelled_at),
            already_terminal: false,
        },
        Err(CoreError::AlreadyTerminal { job_id, status }) => {
            let cancelled_at = state
                .registry
                .get_job(job_id, auth.user_id)
                .await?
                .cancelled_at;
            CancelResponse {
                job_id,
                status,
                cancelled_at,
                already_terminal: true,
            }
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(DataResponse { data: response }))
}
