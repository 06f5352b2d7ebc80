//! Generation job record, status enum, and lifecycle state machine.
//!
//! This module is pure: every mutation takes the current time as an
//! argument and returns a [`CoreError`] instead of touching any shared
//! state. The registry layer is responsible for serializing calls per job.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::scheduling::PRIORITY_NORMAL;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// The only job type accepted by the generation service.
pub const JOB_TYPE_CHAPTER_GENERATION: &str = "chapter_generation";

/// Upper bound of `progress_percentage`.
pub const MAX_PROGRESS: u8 = 100;

/// Maximum length of a worker-reported stage label.
pub const MAX_STAGE_LENGTH: usize = 200;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// `completed`, `failed` and `cancelled` admit no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a job in this status may still be cancelled.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the job is waiting for worker capacity or setup.
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Queued | Self::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Allowed job status transitions.
///
/// ```text
/// queued -> pending -> in_progress -> completed
///    |         |            |
///    +---------+------------+--> failed | cancelled
/// ```
///
/// `queued -> in_progress` is accepted for workers that skip the claim
/// step. `completed` is only reachable from `in_progress`.
pub mod state_machine {
    use super::JobStatus;
    use crate::error::CoreError;

    /// Returns the set of statuses reachable from `from`.
    pub fn valid_transitions(from: JobStatus) -> &'static [JobStatus] {
        use JobStatus::*;
        match from {
            Queued => &[Pending, InProgress, Failed, Cancelled],
            Pending => &[InProgress, Failed, Cancelled],
            InProgress => &[Completed, Failed, Cancelled],
            Completed | Failed | Cancelled => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a transition, returning `InvalidTransition` for invalid ones.
    pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition { from, to })
        }
    }
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

/// Metadata produced by a successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub word_count: u32,
    pub version_id: DbId,
    pub version_number: i32,
    pub model: String,
}

/// Terminal outcome reported for a job.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalOutcome {
    Completed(ResultMetadata),
    Failed(String),
    Cancelled,
}

impl TerminalOutcome {
    /// The status this outcome transitions a job into.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Completed(_) => JobStatus::Completed,
            Self::Failed(_) => JobStatus::Failed,
            Self::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// Input for creating a new generation job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGenerationJob {
    pub trilogy_id: DbId,
    pub character_id: DbId,
    pub sub_chapter_id: DbId,
    #[serde(default = "default_job_type")]
    pub job_type: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

fn default_job_type() -> String {
    JOB_TYPE_CHAPTER_GENERATION.to_string()
}

impl NewGenerationJob {
    /// Check the job type and that `parameters` is a JSON object.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.job_type != JOB_TYPE_CHAPTER_GENERATION {
            return Err(CoreError::Validation(format!(
                "Unsupported job type '{}'. Only '{JOB_TYPE_CHAPTER_GENERATION}' is accepted",
                self.job_type
            )));
        }
        if let Some(params) = &self.parameters {
            if !params.is_object() {
                return Err(CoreError::Validation(
                    "parameters must be a JSON object".into(),
                ));
            }
        }
        Ok(())
    }
}

/// A worker-reported progress update.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressUpdate {
    pub stage: Option<String>,
    pub percentage: i32,
    pub estimated_completion: Option<Timestamp>,
}

/// What actually got recorded for a progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressApplied {
    pub percentage: u8,
    /// `true` when the reported value regressed and the prior value was kept.
    pub clamped: bool,
}

/// One generation job, exclusively owned by the job registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationJob {
    pub id: DbId,
    pub user_id: DbId,
    pub trilogy_id: DbId,
    pub character_id: DbId,
    pub sub_chapter_id: DbId,
    pub worker_task_id: Option<Uuid>,
    pub job_type: String,
    pub priority: i32,
    pub status: JobStatus,
    pub stage: Option<String>,
    pub progress_percentage: u8,
    pub estimated_completion: Option<Timestamp>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub result: Option<ResultMetadata>,
    pub parameters: serde_json::Value,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl GenerationJob {
    /// Build a freshly admitted job in `queued` state.
    pub fn new(id: DbId, user_id: DbId, input: NewGenerationJob, now: Timestamp) -> Self {
        Self {
            id,
            user_id,
            trilogy_id: input.trilogy_id,
            character_id: input.character_id,
            sub_chapter_id: input.sub_chapter_id,
            worker_task_id: None,
            job_type: input.job_type,
            priority: input.priority.unwrap_or(PRIORITY_NORMAL),
            status: JobStatus::Queued,
            stage: None,
            progress_percentage: 0,
            estimated_completion: None,
            error_message: None,
            retry_count: 0,
            result: None,
            parameters: input
                .parameters
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            created_at: now,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn can_cancel(&self) -> bool {
        self.status.can_cancel()
    }

    /// Seconds until the worker's estimated completion, floored at zero.
    ///
    /// `None` when there is no estimate or the job already finished.
    pub fn time_remaining_seconds(&self, now: Timestamp) -> Option<i64> {
        if self.is_terminal() {
            return None;
        }
        self.estimated_completion
            .map(|eta| (eta - now).num_seconds().max(0))
    }

    /// Wall-clock duration of the job, measured from execution start (or
    /// creation when it never started) to completion or `now`.
    pub fn duration(&self, now: Timestamp) -> chrono::Duration {
        let start = self.started_at.unwrap_or(self.created_at);
        let end = self.completed_at.unwrap_or(now);
        (end - start).max(chrono::Duration::zero())
    }

    /// Worker-originated move into `pending` or `in_progress`.
    pub fn advance(&mut self, to: JobStatus, now: Timestamp) -> Result<(), CoreError> {
        if to.is_terminal() {
            return Err(CoreError::Validation(format!(
                "'{to}' must be reported as a terminal outcome"
            )));
        }
        state_machine::validate_transition(self.status, to)?;
        if to == JobStatus::InProgress && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a worker progress report.
    ///
    /// Values outside `[0, 100]` are rejected. A decrease is treated as a
    /// worker bug: the prior value is kept and `clamped` is set.
    pub fn apply_progress(
        &mut self,
        update: ProgressUpdate,
        now: Timestamp,
    ) -> Result<ProgressApplied, CoreError> {
        if !matches!(self.status, JobStatus::Pending | JobStatus::InProgress) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: JobStatus::InProgress,
            });
        }
        let percentage = u8::try_from(update.percentage)
            .ok()
            .filter(|p| *p <= MAX_PROGRESS)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "progress percentage must be within 0..=100, got {}",
                    update.percentage
                ))
            })?;
        if let Some(stage) = &update.stage {
            if stage.chars().count() > MAX_STAGE_LENGTH {
                return Err(CoreError::Validation(format!(
                    "stage label exceeds {MAX_STAGE_LENGTH} characters"
                )));
            }
        }

        let clamped = percentage < self.progress_percentage;
        if !clamped {
            self.progress_percentage = percentage;
        }
        if update.stage.is_some() {
            self.stage = update.stage;
        }
        if update.estimated_completion.is_some() {
            self.estimated_completion = update.estimated_completion;
        }
        self.updated_at = now;

        Ok(ProgressApplied {
            percentage: self.progress_percentage,
            clamped,
        })
    }

    /// Record a transient retry observed by the worker.
    pub fn record_retry(&mut self, now: Timestamp) -> Result<u32, CoreError> {
        if self.is_terminal() {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: self.status,
            });
        }
        self.retry_count += 1;
        self.updated_at = now;
        Ok(self.retry_count)
    }

    /// Move the job into a terminal state.
    pub fn finish(&mut self, outcome: TerminalOutcome, now: Timestamp) -> Result<(), CoreError> {
        state_machine::validate_transition(self.status, outcome.status())?;
        self.status = outcome.status();
        match outcome {
            TerminalOutcome::Completed(metadata) => {
                self.progress_percentage = MAX_PROGRESS;
                self.result = Some(metadata);
            }
            TerminalOutcome::Failed(message) => {
                self.error_message = Some(message);
            }
            TerminalOutcome::Cancelled => {
                self.cancelled_at = Some(now);
            }
        }
        self.estimated_completion = None;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// User-initiated cancellation.
    ///
    /// Fails with `AlreadyTerminal` instead of `InvalidTransition` so the
    /// caller can tell a finished job apart from a protocol error.
    pub fn cancel(&mut self, now: Timestamp) -> Result<Timestamp, CoreError> {
        if self.is_terminal() {
            return Err(CoreError::AlreadyTerminal {
                job_id: self.id,
                status: self.status,
            });
        }
        self.finish(TerminalOutcome::Cancelled, now)?;
        Ok(now)
    }
}

// ---------------------------------------------------------------------------
// JobView
// ---------------------------------------------------------------------------

/// A job snapshot plus the fields derived at read time.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: GenerationJob,
    pub can_cancel: bool,
    pub time_remaining_seconds: Option<i64>,
}

impl JobView {
    pub fn new(job: GenerationJob, now: Timestamp) -> Self {
        Self {
            can_cancel: job.can_cancel(),
            time_remaining_seconds: job.time_remaining_seconds(now),
            job,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
