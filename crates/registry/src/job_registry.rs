//! Job registry: the single owner of generation job state.
//!
//! Each job lives behind its own `tokio::sync::Mutex`, so progress reports,
//! terminal reports, cancellation and the stale sweep for one job are
//! totally ordered while different jobs proceed independently. The outer
//! map lock is only held long enough to clone a job handle.
//!
//! Worker-reported anomalies (regressions, late or duplicate reports) are
//! clamped or refused and logged here; callers on the worker side receive
//! the error, end users never do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use quill_core::error::CoreError;
use quill_core::generation_job::{
    GenerationJob, JobStatus, NewGenerationJob, ProgressApplied, ProgressUpdate, TerminalOutcome,
};
use quill_core::polling::{self, PollBackoff, PollResponse};
use quill_core::types::{DbId, Timestamp};
use quill_events::{EventBus, JobEvent};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::queue::{WorkItem, WorkQueue};
use crate::readiness::ReadinessGate;

type JobHandle = Arc<Mutex<GenerationJob>>;

/// Result of a successful cancellation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelResult {
    pub job_id: DbId,
    pub status: JobStatus,
    pub cancelled_at: Timestamp,
}

/// Owner of all generation jobs.
pub struct JobRegistry {
    jobs: RwLock<HashMap<DbId, JobHandle>>,
    next_id: AtomicI64,
    /// Bumped per user on every job mutation; used to invalidate cached
    /// job lists.
    revisions: RwLock<HashMap<DbId, u64>>,
    readiness: ReadinessGate,
    queue: Arc<dyn WorkQueue>,
    event_bus: Arc<EventBus>,
    backoff: PollBackoff,
}

impl JobRegistry {
    pub fn new(
        readiness: ReadinessGate,
        queue: Arc<dyn WorkQueue>,
        event_bus: Arc<EventBus>,
        backoff: PollBackoff,
    ) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            revisions: RwLock::new(HashMap::new()),
            readiness,
            queue,
            event_bus,
            backoff,
        }
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Admit a new job after the readiness gate passes.
    ///
    /// The job is stored as `queued` and handed to the worker queue. An
    /// enqueue failure is logged but does not undo the admission.
    pub async fn create_job(
        &self,
        user_id: DbId,
        input: NewGenerationJob,
    ) -> Result<GenerationJob, CoreError> {
        input.validate()?;

        if let Err(e) = self.readiness.ensure_ready(input.character_id).await {
            tracing::info!(
                user_id,
                character_id = input.character_id,
                error = %e,
                "Job submission rejected by readiness gate",
            );
            return Err(e);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = GenerationJob::new(id, user_id, input, Utc::now());
        let handle: JobHandle = Arc::new(Mutex::new(job));

        // Hold the job lock across insert + enqueue so an eager worker's
        // first report waits for `worker_task_id` to be recorded.
        let mut guard = handle.lock().await;
        self.jobs.write().await.insert(id, Arc::clone(&handle));

        let item = WorkItem {
            task_id: Uuid::new_v4(),
            job_id: id,
            user_id,
            trilogy_id: guard.trilogy_id,
            character_id: guard.character_id,
            sub_chapter_id: guard.sub_chapter_id,
            priority: guard.priority,
            parameters: guard.parameters.clone(),
        };
        match self.queue.enqueue(item) {
            Ok(task_id) => guard.worker_task_id = Some(task_id),
            Err(e) => {
                tracing::warn!(job_id = id, error = %e, "Failed to enqueue job with worker pool");
            }
        }
        let job = guard.clone();
        drop(guard);

        self.bump_revision(user_id).await;
        tracing::info!(
            job_id = id,
            user_id,
            character_id = job.character_id,
            sub_chapter_id = job.sub_chapter_id,
            priority = job.priority,
            "Generation job queued",
        );
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Snapshot of a job, visible only to its owner.
    pub async fn get_job(&self, job_id: DbId, user_id: DbId) -> Result<GenerationJob, CoreError> {
        let job = self.snapshot(job_id).await?;
        authorize(&job, user_id, "view")?;
        Ok(job)
    }

    /// Poll contract for a job, visible only to its owner.
    pub async fn poll(&self, job_id: DbId, user_id: DbId) -> Result<PollResponse, CoreError> {
        let job = self.snapshot(job_id).await?;
        authorize(&job, user_id, "poll")?;
        Ok(polling::project(&job, Utc::now(), &self.backoff))
    }

    /// Consistent snapshot of every job, for list projections.
    pub async fn snapshot_all(&self) -> Vec<GenerationJob> {
        let handles: Vec<JobHandle> = self.jobs.read().await.values().cloned().collect();
        let mut jobs = Vec::with_capacity(handles.len());
        for handle in handles {
            jobs.push(handle.lock().await.clone());
        }
        jobs
    }

    /// Current list revision for `user_id`.
    pub async fn user_revision(&self, user_id: DbId) -> u64 {
        self.revisions
            .read()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Cancel a job on behalf of its owner.
    ///
    /// The worker is signalled best-effort and not awaited. Returns
    /// `AlreadyTerminal` if the job finished (or was cancelled) first.
    pub async fn cancel(&self, job_id: DbId, user_id: DbId) -> Result<CancelResult, CoreError> {
        let handle = self.handle(job_id).await?;
        let mut job = handle.lock().await;
        authorize(&job, user_id, "cancel")?;

        let cancelled_at = match job.cancel(Utc::now()) {
            Ok(at) => at,
            Err(e) => {
                tracing::info!(job_id, user_id, error = %e, "Cancel on finished job");
                return Err(e);
            }
        };

        if let Some(task_id) = job.worker_task_id {
            if let Err(e) = self.queue.abort(task_id) {
                tracing::warn!(
                    job_id,
                    error = %e,
                    "Failed to signal worker abort (job already marked cancelled)",
                );
            }
        }

        let snapshot = job.clone();
        drop(job);

        tracing::info!(job_id, user_id, "Generation job cancelled");
        self.after_terminal(&snapshot).await;

        Ok(CancelResult {
            job_id,
            status: snapshot.status,
            cancelled_at,
        })
    }

    // -----------------------------------------------------------------------
    // Worker reports
    // -----------------------------------------------------------------------

    /// Worker moved the job to `pending` or `in_progress`.
    pub async fn report_status(&self, job_id: DbId, to: JobStatus) -> Result<GenerationJob, CoreError> {
        let handle = self.handle(job_id).await?;
        let mut job = handle.lock().await;
        if let Err(e) = job.advance(to, Utc::now()) {
            tracing::warn!(job_id, to = %to, error = %e, "Ignoring worker status report");
            return Err(e);
        }
        let snapshot = job.clone();
        drop(job);

        tracing::debug!(job_id, status = %to, "Job status advanced");
        self.bump_revision(snapshot.user_id).await;
        Ok(snapshot)
    }

    /// Worker progress update. Regressions are clamped to the prior value.
    pub async fn report_progress(
        &self,
        job_id: DbId,
        update: ProgressUpdate,
    ) -> Result<ProgressApplied, CoreError> {
        let handle = self.handle(job_id).await?;
        let mut job = handle.lock().await;
        let reported = update.percentage;

        match job.apply_progress(update, Utc::now()) {
            Ok(applied) => {
                if applied.clamped {
                    tracing::warn!(
                        job_id,
                        reported,
                        kept = applied.percentage,
                        "Worker reported progress regression, clamped to prior value",
                    );
                } else {
                    tracing::debug!(job_id, progress = applied.percentage, "Job progress updated");
                }
                let user_id = job.user_id;
                drop(job);
                self.bump_revision(user_id).await;
                Ok(applied)
            }
            Err(e) => {
                tracing::warn!(job_id, reported, error = %e, "Ignoring worker progress report");
                Err(e)
            }
        }
    }

    /// Worker retried the job after a transient error.
    pub async fn report_retry(&self, job_id: DbId) -> Result<u32, CoreError> {
        let handle = self.handle(job_id).await?;
        let mut job = handle.lock().await;
        match job.record_retry(Utc::now()) {
            Ok(count) => {
                tracing::info!(job_id, retry_count = count, "Worker retrying job");
                let user_id = job.user_id;
                drop(job);
                self.bump_revision(user_id).await;
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Ignoring worker retry report");
                Err(e)
            }
        }
    }

    /// Worker reported a terminal outcome. The first terminal report wins.
    pub async fn report_terminal(
        &self,
        job_id: DbId,
        outcome: TerminalOutcome,
    ) -> Result<GenerationJob, CoreError> {
        let handle = self.handle(job_id).await?;
        let mut job = handle.lock().await;
        let target = outcome.status();

        if let Err(e) = job.finish(outcome, Utc::now()) {
            tracing::warn!(job_id, to = %target, error = %e, "Ignoring worker terminal report");
            return Err(e);
        }
        let snapshot = job.clone();
        drop(job);

        tracing::info!(job_id, status = %target, "Generation job finished");
        self.after_terminal(&snapshot).await;
        Ok(snapshot)
    }

    // -----------------------------------------------------------------------
    // Stale sweep
    // -----------------------------------------------------------------------

    /// Fail every executing job whose last update is older than `timeout`.
    ///
    /// Only `pending` and `in_progress` jobs are swept. A `queued` job is
    /// waiting for worker capacity and receives no updates until claimed.
    /// Each job is checked and failed under its own lock, so a report that
    /// lands first keeps the job alive. Returns the ids that were failed.
    pub async fn sweep_stale(&self, timeout: chrono::Duration, now: Timestamp) -> Vec<DbId> {
        let handles: Vec<JobHandle> = self.jobs.read().await.values().cloned().collect();
        let minutes = timeout.num_minutes();
        let mut failed = Vec::new();

        for handle in handles {
            let mut job = handle.lock().await;
            let executing = matches!(job.status, JobStatus::Pending | JobStatus::InProgress);
            if !executing || now - job.updated_at < timeout {
                continue;
            }
            let message = format!("Job timed out after {minutes} minutes without progress");
            if job.finish(TerminalOutcome::Failed(message), now).is_err() {
                continue;
            }
            if let Some(task_id) = job.worker_task_id {
                if let Err(e) = self.queue.abort(task_id) {
                    tracing::warn!(job_id = job.id, error = %e, "Failed to abort timed-out task");
                }
            }
            let snapshot = job.clone();
            drop(job);

            tracing::warn!(job_id = snapshot.id, timeout_mins = minutes, "Stale job failed");
            self.after_terminal(&snapshot).await;
            failed.push(snapshot.id);
        }

        failed
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn handle(&self, job_id: DbId) -> Result<JobHandle, CoreError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "GenerationJob",
                id: job_id,
            })
    }

    async fn snapshot(&self, job_id: DbId) -> Result<GenerationJob, CoreError> {
        let handle = self.handle(job_id).await?;
        let job = handle.lock().await.clone();
        Ok(job)
    }

    async fn bump_revision(&self, user_id: DbId) {
        *self.revisions.write().await.entry(user_id).or_insert(0) += 1;
    }

    /// Publish the terminal event and invalidate list caches.
    async fn after_terminal(&self, job: &GenerationJob) {
        if let Some(event) = JobEvent::terminal(job, Utc::now()) {
            self.event_bus.publish(event);
        }
        self.bump_revision(job.user_id).await;
    }
}

/// Reject access by anyone but the job's owner.
fn authorize(job: &GenerationJob, user_id: DbId, action: &str) -> Result<(), CoreError> {
    if job.user_id != user_id {
        return Err(CoreError::Forbidden(format!(
            "Cannot {action} another user's job"
        )));
    }
    Ok(())
}
