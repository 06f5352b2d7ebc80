//! Event type names published on the event bus for job lifecycle changes.
//!
//! Used by the job registry when a job reaches a terminal state and by the
//! notification router when matching events to users.

/// Job completed successfully.
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// Job failed with an error.
pub const EVENT_JOB_FAILED: &str = "job.failed";

/// Job was cancelled by its owner.
pub const EVENT_JOB_CANCELLED: &str = "job.cancelled";

/// Map a terminal status to its event type name.
pub fn event_type_for(status: crate::generation_job::JobStatus) -> Option<&'static str> {
    use crate::generation_job::JobStatus;
    match status {
        JobStatus::Completed => Some(EVENT_JOB_COMPLETED),
        JobStatus::Failed => Some(EVENT_JOB_FAILED),
        JobStatus::Cancelled => Some(EVENT_JOB_CANCELLED),
        _ => None,
    }
}
