//! Priority constants and queue-position estimation.
//!
//! Priority is a display hint only: it feeds the estimated queue position
//! shown to clients and never changes the order in which the worker pool
//! executes jobs. Higher numbers are more urgent.

use std::cmp::Ordering;

use crate::generation_job::GenerationJob;

// ---------------------------------------------------------------------------
// Priority constants
// ---------------------------------------------------------------------------

/// Priority value for urgent jobs.
pub const PRIORITY_URGENT: i32 = 10;

/// Priority value for normal jobs. Default.
pub const PRIORITY_NORMAL: i32 = 0;

/// Priority value for background jobs.
pub const PRIORITY_BACKGROUND: i32 = -10;

// ---------------------------------------------------------------------------
// Queue position
// ---------------------------------------------------------------------------

/// Ordering of waiting jobs: higher priority first, then older first.
///
/// Job ids are assigned monotonically, so they break ties between jobs
/// created within the same timestamp.
pub fn queue_order(a: &GenerationJob, b: &GenerationJob) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.created_at.cmp(&b.created_at))
        .then(a.id.cmp(&b.id))
}

/// Estimated rank of a non-terminal `job`.
///
/// Waiting jobs get a 1-based rank among `waiting`, which should hold every
/// `queued`/`pending` job visible to the registry, across all users. A
/// running job has nothing ahead of it and gets `0`. Terminal jobs get
/// `None`.
pub fn queue_position<'a, I>(job: &GenerationJob, waiting: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a GenerationJob>,
{
    if job.is_terminal() {
        return None;
    }
    if !job.status.is_waiting() {
        return Some(0);
    }
    let ahead = waiting
        .into_iter()
        .filter(|other| other.id != job.id && other.status.is_waiting())
        .filter(|other| queue_order(other, job) == Ordering::Less)
        .count();
    Some(ahead + 1)
}
