//! Callbacks from the worker pool and the embedding subsystem.
//!
//! All endpoints require [`WorkerAuth`]. Rejected reports (late, duplicate
//! or out-of-order) come back to the worker as 409 `INVALID_TRANSITION`;
//! the job itself is left untouched.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use quill_core::error::CoreError;
use quill_core::generation_job::{
    JobStatus, JobView, ProgressUpdate, ResultMetadata, TerminalOutcome,
};
use quill_core::readiness::VectorStoreReport;
use quill_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::WorkerAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// Maximum length of a worker-reported failure message.
const MAX_ERROR_MESSAGE_LENGTH: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct StatusReport {
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct FailureReport {
    pub error_message: String,
}

#[derive(Debug, Serialize)]
pub struct ProgressAck {
    pub job_id: DbId,
    pub progress_percentage: u8,
    /// `true` when the report regressed and the prior value was kept.
    pub clamped: bool,
}

#[derive(Debug, Serialize)]
pub struct RetryAck {
    pub job_id: DbId,
    pub retry_count: u32,
}

// ---------------------------------------------------------------------------
// Job lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/internal/jobs/{id}/status
///
/// Move a job into `pending` or `in_progress`.
pub async fn report_status(
    _worker: WorkerAuth,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(report): Json<StatusReport>,
) -> AppResult<impl IntoResponse> {
    let job = state.registry.report_status(job_id, report.status).await?;
    Ok(Json(DataResponse {
        data: JobView::new(job, Utc::now()),
    }))
}

/// POST /api/v1/internal/jobs/{id}/progress
pub async fn report_progress(
    _worker: WorkerAuth,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(update): Json<ProgressUpdate>,
) -> AppResult<impl IntoResponse> {
    let applied = state.registry.report_progress(job_id, update).await?;
    Ok(Json(DataResponse {
        data: ProgressAck {
            job_id,
            progress_percentage: applied.percentage,
            clamped: applied.clamped,
        },
    }))
}

/// POST /api/v1/internal/jobs/{id}/retry
pub async fn report_retry(
    _worker: WorkerAuth,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let retry_count = state.registry.report_retry(job_id).await?;
    Ok(Json(DataResponse {
        data: RetryAck {
            job_id,
            retry_count,
        },
    }))
}

/// POST /api/v1/internal/jobs/{id}/complete
pub async fn report_complete(
    _worker: WorkerAuth,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(metadata): Json<ResultMetadata>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .registry
        .report_terminal(job_id, TerminalOutcome::Completed(metadata))
        .await?;
    Ok(Json(DataResponse {
        data: JobView::new(job, Utc::now()),
    }))
}

/// POST /api/v1/internal/jobs/{id}/fail
pub async fn report_fail(
    _worker: WorkerAuth,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(report): Json<FailureReport>,
) -> AppResult<impl IntoResponse> {
    let message = report.error_message.trim();
    if message.is_empty() {
        return Err(CoreError::Validation("error_message must not be empty".into()).into());
    }
    let message: String = message.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect();

    let job = state
        .registry
        .report_terminal(job_id, TerminalOutcome::Failed(message))
        .await?;
    Ok(Json(DataResponse {
        data: JobView::new(job, Utc::now()),
    }))
}

/// POST /api/v1/internal/jobs/{id}/cancelled
///
/// The worker stopped the job on its own, e.g. after an operator abort.
/// A job the user already cancelled reports 409 like any late report.
pub async fn report_cancelled(
    _worker: WorkerAuth,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .registry
        .report_terminal(job_id, TerminalOutcome::Cancelled)
        .await?;
    Ok(Json(DataResponse {
        data: JobView::new(job, Utc::now()),
    }))
}

// ---------------------------------------------------------------------------
// Embedding subsystem
// ---------------------------------------------------------------------------

/// PUT /api/v1/internal/characters/{id}/vector-store
///
/// Record the latest vector store status for a character.
pub async fn report_vector_store(
    _worker: WorkerAuth,
    State(state): State<AppState>,
    Path(character_id): Path<DbId>,
    Json(report): Json<VectorStoreReport>,
) -> AppResult<impl IntoResponse> {
    let status = state.vector_stores.report(character_id, report).await;
    Ok(Json(DataResponse { data: status }))
}
