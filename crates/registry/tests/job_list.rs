//! Job listing, queue positions and cache behaviour.

mod common;

use std::time::Duration;

use common::{harness, metadata, new_job, READY_CHARACTER};
use quill_core::generation_job::{JobStatus, TerminalOutcome};
use quill_core::scheduling::PRIORITY_URGENT;
use quill_registry::{JobListProjector, JobListQuery};

fn query() -> JobListQuery {
    JobListQuery::default()
}

#[tokio::test]
async fn lists_only_own_jobs_newest_first() {
    let h = harness().await;
    let first = h.registry.create_job(7, new_job(READY_CHARACTER, 1)).await.unwrap();
    h.registry.create_job(8, new_job(READY_CHARACTER, 2)).await.unwrap();
    let second = h.registry.create_job(7, new_job(READY_CHARACTER, 3)).await.unwrap();

    let projector = JobListProjector::new(h.registry.clone(), Duration::ZERO);
    let list = projector.list_jobs(7, &query()).await;

    assert_eq!(list.total_count, 2);
    let ids: Vec<_> = list.jobs.iter().map(|j| j.id).collect();
    assert_eq!(ids, [second.id, first.id]);
    assert!(!list.cached);
    assert_eq!(list.cache_ttl_seconds, None);
}

#[tokio::test]
async fn status_filter_and_pagination() {
    let h = harness().await;
    for sub in 0..5 {
        h.registry.create_job(7, new_job(READY_CHARACTER, sub)).await.unwrap();
    }
    let running = h.registry.create_job(7, new_job(READY_CHARACTER, 9)).await.unwrap();
    h.registry
        .report_status(running.id, JobStatus::InProgress)
        .await
        .unwrap();

    let projector = JobListProjector::new(h.registry.clone(), Duration::ZERO);

    let in_progress = projector
        .list_jobs(
            7,
            &JobListQuery {
                status: Some(JobStatus::InProgress),
                ..query()
            },
        )
        .await;
    assert_eq!(in_progress.total_count, 1);
    assert_eq!(in_progress.jobs[0].id, running.id);
    assert_eq!(in_progress.jobs[0].queue_position, Some(0));

    let page = projector
        .list_jobs(
            7,
            &JobListQuery {
                limit: Some(2),
                offset: Some(4),
                ..query()
            },
        )
        .await;
    assert_eq!(page.total_count, 6);
    assert_eq!(page.jobs.len(), 2);
}

#[tokio::test]
async fn queue_position_counts_all_users_and_priority() {
    let h = harness().await;
    let other = h.registry.create_job(8, new_job(READY_CHARACTER, 1)).await.unwrap();
    let mine = h.registry.create_job(7, new_job(READY_CHARACTER, 2)).await.unwrap();
    let mut urgent_input = new_job(READY_CHARACTER, 3);
    urgent_input.priority = Some(PRIORITY_URGENT);
    let urgent = h.registry.create_job(7, urgent_input).await.unwrap();

    let projector = JobListProjector::new(h.registry.clone(), Duration::ZERO);
    let list = projector.list_jobs(7, &query()).await;
    let position = |id| {
        list.jobs
            .iter()
            .find(|j| j.id == id)
            .and_then(|j| j.queue_position)
    };

    assert_eq!(position(urgent.id), Some(1));
    assert_eq!(position(mine.id), Some(3));

    h.registry.cancel(other.id, 8).await.unwrap();
    let list = projector.list_jobs(7, &query()).await;
    let mine_summary = list.jobs.iter().find(|j| j.id == mine.id).unwrap();
    assert_eq!(mine_summary.queue_position, Some(2));

    // Once the urgent job starts running it sits at 0 and no longer
    // counts ahead of waiting work.
    h.registry
        .report_status(urgent.id, JobStatus::InProgress)
        .await
        .unwrap();
    let list = projector.list_jobs(7, &query()).await;
    let running = list.jobs.iter().find(|j| j.id == urgent.id).unwrap();
    assert_eq!(running.status, JobStatus::InProgress);
    assert_eq!(running.queue_position, Some(0));
    let mine_summary = list.jobs.iter().find(|j| j.id == mine.id).unwrap();
    assert_eq!(mine_summary.queue_position, Some(1));

    h.registry.cancel(mine.id, 7).await.unwrap();
    let list = projector.list_jobs(7, &query()).await;
    let cancelled = list.jobs.iter().find(|j| j.id == mine.id).unwrap();
    assert_eq!(cancelled.queue_position, None);
}

#[tokio::test(start_paused = true)]
async fn cached_listing_expires_after_ttl() {
    let h = harness().await;
    h.registry.create_job(7, new_job(READY_CHARACTER, 1)).await.unwrap();
    let projector = JobListProjector::new(h.registry.clone(), Duration::from_secs(5));

    let fresh = projector.list_jobs(7, &query()).await;
    assert!(!fresh.cached);

    tokio::time::advance(Duration::from_secs(2)).await;
    let cached = projector.list_jobs(7, &query()).await;
    assert!(cached.cached);
    assert_eq!(cached.cache_ttl_seconds, Some(3));
    assert_eq!(cached.jobs, fresh.jobs);

    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(!projector.list_jobs(7, &query()).await.cached);
}

#[tokio::test(start_paused = true)]
async fn refresh_bypasses_cache() {
    let h = harness().await;
    let projector = JobListProjector::new(h.registry.clone(), Duration::from_secs(5));
    projector.list_jobs(7, &query()).await;

    let refreshed = projector
        .list_jobs(
            7,
            &JobListQuery {
                refresh: true,
                ..query()
            },
        )
        .await;
    assert!(!refreshed.cached);
}

#[tokio::test(start_paused = true)]
async fn job_mutation_invalidates_owner_cache() {
    let h = harness().await;
    let job = h.registry.create_job(7, new_job(READY_CHARACTER, 1)).await.unwrap();
    let projector = JobListProjector::new(h.registry.clone(), Duration::from_secs(5));
    projector.list_jobs(7, &query()).await;
    projector.list_jobs(8, &query()).await;

    h.registry.report_status(job.id, JobStatus::InProgress).await.unwrap();
    h.registry
        .report_terminal(job.id, TerminalOutcome::Completed(metadata(300)))
        .await
        .unwrap();

    let list = projector.list_jobs(7, &query()).await;
    assert!(!list.cached);
    assert_eq!(list.jobs[0].status, JobStatus::Completed);
    assert_eq!(list.jobs[0].result.as_ref().unwrap().word_count, 300);

    // Another user's cache is untouched.
    assert!(projector.list_jobs(8, &query()).await.cached);
}
