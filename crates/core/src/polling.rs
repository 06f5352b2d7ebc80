//! Poll contract: a pure projection from a job snapshot to the status code
//! and payload returned to polling clients.
//!
//! | Job status                          | Code | Keep polling? |
//! |-------------------------------------|------|---------------|
//! | `queued`, `pending`, `in_progress`  | 202  | yes, after `poll_after_seconds` |
//! | `completed`                         | 200  | no            |
//! | `failed`                            | 500  | no            |
//! | `cancelled`                         | 409  | no            |
//!
//! Any other code seen by a client is a transport error, not a job state.

use serde::Serialize;

use crate::generation_job::{GenerationJob, JobStatus, ResultMetadata};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

pub const POLL_STATUS_IN_PROGRESS: u16 = 202;
pub const POLL_STATUS_COMPLETED: u16 = 200;
pub const POLL_STATUS_FAILED: u16 = 500;
pub const POLL_STATUS_CANCELLED: u16 = 409;

/// Map a job status to its poll status code.
pub fn status_code(status: JobStatus) -> u16 {
    match status {
        JobStatus::Queued | JobStatus::Pending | JobStatus::InProgress => POLL_STATUS_IN_PROGRESS,
        JobStatus::Completed => POLL_STATUS_COMPLETED,
        JobStatus::Failed => POLL_STATUS_FAILED,
        JobStatus::Cancelled => POLL_STATUS_CANCELLED,
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Default first poll delay in seconds.
pub const DEFAULT_POLL_BASE_SECS: u64 = 2;

/// Default ceiling for the poll delay in seconds.
pub const DEFAULT_POLL_MAX_SECS: u64 = 30;

/// Default wait time after which the poll delay doubles.
pub const DEFAULT_POLL_STEP_SECS: u64 = 20;

/// Backoff curve for `poll_after_seconds`.
///
/// The hint is `base * 2^(elapsed / step)` capped at `max`, where
/// `elapsed` is the time since the job was created. It only depends on
/// elapsed wait time, so successive polls of one job never see it shrink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBackoff {
    pub base_secs: u64,
    pub max_secs: u64,
    pub step_secs: u64,
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self {
            base_secs: DEFAULT_POLL_BASE_SECS,
            max_secs: DEFAULT_POLL_MAX_SECS,
            step_secs: DEFAULT_POLL_STEP_SECS,
        }
    }
}

impl PollBackoff {
    /// Suggested delay before the next poll, given how long the job has
    /// been waiting. Negative elapsed time (clock skew) counts as zero.
    pub fn poll_after_seconds(&self, elapsed: chrono::Duration) -> u64 {
        let elapsed_secs = u64::try_from(elapsed.num_seconds()).unwrap_or(0);
        let doublings = elapsed_secs / self.step_secs.max(1);
        let factor = u32::try_from(doublings)
            .ok()
            .and_then(|d| 1u64.checked_shl(d))
            .unwrap_or(u64::MAX);
        self.base_secs.saturating_mul(factor).min(self.max_secs)
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Body returned by the poll endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollPayload {
    pub job_id: DbId,
    pub status: JobStatus,
    pub stage: Option<String>,
    pub progress_percentage: u8,
    pub estimated_completion: Option<Timestamp>,
    pub time_remaining_seconds: Option<i64>,
    pub can_cancel: bool,
    /// `None` tells the client to stop polling.
    pub poll_after_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<Timestamp>,
}

/// Status code plus payload for one poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResponse {
    pub status_code: u16,
    pub payload: PollPayload,
}

/// Project a job snapshot onto the poll contract.
pub fn project(job: &GenerationJob, now: Timestamp, backoff: &PollBackoff) -> PollResponse {
    let mut payload = PollPayload {
        job_id: job.id,
        status: job.status,
        stage: job.stage.clone(),
        progress_percentage: job.progress_percentage,
        estimated_completion: None,
        time_remaining_seconds: None,
        can_cancel: job.can_cancel(),
        poll_after_seconds: None,
        result: None,
        completed_at: None,
        error_message: None,
        cancelled_at: None,
    };

    match job.status {
        JobStatus::Queued | JobStatus::Pending | JobStatus::InProgress => {
            payload.estimated_completion = job.estimated_completion;
            payload.time_remaining_seconds = job.time_remaining_seconds(now);
            payload.poll_after_seconds = Some(backoff.poll_after_seconds(now - job.created_at));
        }
        JobStatus::Completed => {
            payload.result = job.result.clone();
            payload.completed_at = job.completed_at;
        }
        JobStatus::Failed => {
            payload.error_message = Some(
                job.error_message
                    .clone()
                    .unwrap_or_else(|| "Generation failed".to_string()),
            );
            payload.completed_at = job.completed_at;
        }
        JobStatus::Cancelled => {
            payload.cancelled_at = job.cancelled_at.or(job.completed_at);
        }
    }

    PollResponse {
        status_code: status_code(job.status),
        payload,
    }
}
