//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans out [`JobEvent`]s to every subscriber. It is shared as
//! `Arc<EventBus>` between the job registry (publisher) and the
//! notification router (subscriber).

use chrono::{DateTime, Utc};
use quill_core::generation_job::{GenerationJob, JobStatus};
use quill_core::job_events::event_type_for;
use quill_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A terminal job transition, as seen by notification consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Dot-separated event name, e.g. `"job.completed"`.
    pub event_type: String,
    pub job_id: DbId,
    /// Owner of the job; the only recipient of outcome notices.
    pub user_id: DbId,
    pub status: JobStatus,
    pub trilogy_id: DbId,
    pub sub_chapter_id: DbId,
    /// Execution time used for the long-running threshold.
    pub duration_secs: i64,
    /// Outcome details (word count, error message).
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Build the event for a job that just reached a terminal state.
    ///
    /// Returns `None` for non-terminal jobs.
    pub fn terminal(job: &GenerationJob, now: DateTime<Utc>) -> Option<Self> {
        let event_type = event_type_for(job.status)?;
        let payload = match job.status {
            JobStatus::Completed => serde_json::json!({
                "result": job.result,
                "completed_at": job.completed_at,
            }),
            JobStatus::Failed => serde_json::json!({
                "error_message": job.error_message,
                "retry_count": job.retry_count,
            }),
            _ => serde_json::json!({ "cancelled_at": job.cancelled_at }),
        };
        Some(Self {
            event_type: event_type.to_string(),
            job_id: job.id,
            user_id: job.user_id,
            status: job.status,
            trilogy_id: job.trilogy_id,
            sub_chapter_id: job.sub_chapter_id,
            duration_secs: job.duration(now).num_seconds(),
            payload,
            timestamp: now,
        })
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.duration_secs)
    }

    /// One-line human summary used by toasts and email subjects.
    pub fn summary(&self) -> String {
        match self.status {
            JobStatus::Completed => {
                let words = self
                    .payload
                    .pointer("/result/word_count")
                    .and_then(|v| v.as_u64());
                match words {
                    Some(n) => format!("Chapter generation #{} finished ({n} words)", self.job_id),
                    None => format!("Chapter generation #{} finished", self.job_id),
                }
            }
            JobStatus::Failed => {
                let reason = self
                    .payload
                    .get("error_message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error");
                format!("Chapter generation #{} failed: {reason}", self.job_id)
            }
            _ => format!("Chapter generation #{} was cancelled", self.job_id),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Publishing never blocks and never fails from the publisher's point of
/// view, so a terminal transition is never held up by notification work.
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: JobEvent) {
        // Only fails when there are zero receivers.
        if self.sender.send(event).is_err() {
            tracing::debug!("Job event published with no subscribers");
        }
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use quill_core::generation_job::{
        NewGenerationJob, ResultMetadata, TerminalOutcome, JOB_TYPE_CHAPTER_GENERATION,
    };

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn job() -> GenerationJob {
        GenerationJob::new(
            5,
            7,
            NewGenerationJob {
                trilogy_id: 1,
                character_id: 2,
                sub_chapter_id: 3,
                job_type: JOB_TYPE_CHAPTER_GENERATION.into(),
                priority: None,
                parameters: None,
            },
            t0(),
        )
    }

    #[test]
    fn live_job_has_no_terminal_event() {
        assert!(JobEvent::terminal(&job(), t0()).is_none());
    }

    #[test]
    fn completed_event_carries_word_count_and_duration() {
        let mut job = job();
        job.advance(JobStatus::InProgress, t0()).unwrap();
        let done = t0() + Duration::minutes(4);
        job.finish(
            TerminalOutcome::Completed(ResultMetadata {
                word_count: 1200,
                version_id: 9,
                version_number: 1,
                model: "writer-large".into(),
            }),
            done,
        )
        .unwrap();

        let event = JobEvent::terminal(&job, done).unwrap();
        assert_eq!(event.event_type, "job.completed");
        assert_eq!(event.user_id, 7);
        assert_eq!(event.duration(), Duration::minutes(4));
        assert_eq!(event.summary(), "Chapter generation #5 finished (1200 words)");
    }

    #[test]
    fn failed_event_summary_includes_reason() {
        let mut job = job();
        job.finish(TerminalOutcome::Failed("model timeout".into()), t0())
            .unwrap();
        let event = JobEvent::terminal(&job, t0()).unwrap();
        assert_eq!(event.event_type, "job.failed");
        assert_eq!(event.summary(), "Chapter generation #5 failed: model timeout");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let mut job = job();
        job.cancel(t0()).unwrap();
        bus.publish(JobEvent::terminal(&job, t0()).unwrap());

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.event_type, "job.cancelled");
        assert_eq!(e2.job_id, 5);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        let mut job = job();
        job.cancel(t0()).unwrap();
        bus.publish(JobEvent::terminal(&job, t0()).unwrap());
    }
}
