//! Paginated job summaries with a short-lived per-user cache.
//!
//! Cache entries are keyed by `(user, status filter, limit, offset)` and are
//! valid while younger than the TTL and while the user's registry revision
//! is unchanged. Any mutation of one of the user's jobs bumps the revision.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use quill_core::generation_job::{GenerationJob, JobStatus, ResultMetadata};
use quill_core::scheduling::queue_position;
use quill_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::job_registry::JobRegistry;

/// Default page size.
pub const DEFAULT_LIMIT: usize = 50;

/// Maximum page size.
pub const MAX_LIMIT: usize = 100;

/// Default cache lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Query / response types
// ---------------------------------------------------------------------------

/// Query parameters for listing jobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Skip the cache and rebuild the listing.
    #[serde(default)]
    pub refresh: bool,
}

impl JobListQuery {
    fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// One row of a job listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub id: DbId,
    pub trilogy_id: DbId,
    pub character_id: DbId,
    pub sub_chapter_id: DbId,
    pub status: JobStatus,
    pub stage: Option<String>,
    pub progress_percentage: u8,
    pub priority: i32,
    /// 1-based rank among waiting jobs, `0` while running, `None` once
    /// terminal.
    pub queue_position: Option<usize>,
    pub can_cancel: bool,
    pub time_remaining_seconds: Option<i64>,
    pub error_message: Option<String>,
    pub result: Option<ResultMetadata>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl JobSummary {
    fn from_job(job: &GenerationJob, queue_position: Option<usize>, now: Timestamp) -> Self {
        Self {
            id: job.id,
            trilogy_id: job.trilogy_id,
            character_id: job.character_id,
            sub_chapter_id: job.sub_chapter_id,
            status: job.status,
            stage: job.stage.clone(),
            progress_percentage: job.progress_percentage,
            priority: job.priority,
            queue_position,
            can_cancel: job.can_cancel(),
            time_remaining_seconds: job.time_remaining_seconds(now),
            error_message: job.error_message.clone(),
            result: job.result.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

/// A page of job summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobList {
    pub jobs: Vec<JobSummary>,
    pub total_count: usize,
    pub cached: bool,
    /// Remaining cache lifetime for cached responses, `None` otherwise.
    pub cache_ttl_seconds: Option<u64>,
}

// ---------------------------------------------------------------------------
// Projector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    user_id: DbId,
    status: Option<JobStatus>,
    limit: usize,
    offset: usize,
}

struct CacheEntry {
    built_at: Instant,
    revision: u64,
    jobs: Vec<JobSummary>,
    total_count: usize,
}

/// Builds job listings from registry snapshots.
pub struct JobListProjector {
    registry: Arc<JobRegistry>,
    ttl: Duration,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl JobListProjector {
    /// A zero `ttl` disables caching.
    pub fn new(registry: Arc<JobRegistry>, ttl: Duration) -> Self {
        Self {
            registry,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// List `user_id`'s jobs, newest first.
    pub async fn list_jobs(&self, user_id: DbId, query: &JobListQuery) -> JobList {
        let key = CacheKey {
            user_id,
            status: query.status,
            limit: query.effective_limit(),
            offset: query.effective_offset(),
        };
        let revision = self.registry.user_revision(user_id).await;

        if !query.refresh && !self.ttl.is_zero() {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&key) {
                let age = entry.built_at.elapsed();
                if entry.revision == revision && age < self.ttl {
                    let remaining = (self.ttl - age).as_secs_f64().ceil() as u64;
                    tracing::debug!(user_id, "Job list served from cache");
                    return JobList {
                        jobs: entry.jobs.clone(),
                        total_count: entry.total_count,
                        cached: true,
                        cache_ttl_seconds: Some(remaining),
                    };
                }
            }
        }

        let (jobs, total_count) = self.build(&key).await;

        if !self.ttl.is_zero() {
            let mut cache = self.cache.lock().await;
            // Drop anything that can no longer be served.
            let ttl = self.ttl;
            cache.retain(|_, entry| entry.built_at.elapsed() < ttl);
            cache.insert(
                key,
                CacheEntry {
                    built_at: Instant::now(),
                    revision,
                    jobs: jobs.clone(),
                    total_count,
                },
            );
        }

        JobList {
            jobs,
            total_count,
            cached: false,
            cache_ttl_seconds: None,
        }
    }

    async fn build(&self, key: &CacheKey) -> (Vec<JobSummary>, usize) {
        let now = Utc::now();
        let all = self.registry.snapshot_all().await;
        let waiting: Vec<&GenerationJob> = all.iter().filter(|j| j.status.is_waiting()).collect();

        let mut mine: Vec<&GenerationJob> = all
            .iter()
            .filter(|j| j.user_id == key.user_id)
            .filter(|j| key.status.is_none_or(|s| j.status == s))
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total_count = mine.len();
        let jobs = mine
            .into_iter()
            .skip(key.offset)
            .take(key.limit)
            .map(|job| {
                let position = queue_position(job, waiting.iter().copied());
                JobSummary::from_job(job, position, now)
            })
            .collect();

        (jobs, total_count)
    }
}
