//! In-app toast inbox.
//!
//! Toasts are held per user in a bounded queue until the client drains
//! them. Delivery is at-most-once: a drained toast is gone, and the oldest
//! toasts are dropped when a user's queue is full.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use quill_core::generation_job::JobStatus;
use quill_core::types::DbId;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::bus::JobEvent;

/// Maximum number of undelivered toasts kept per user.
pub const MAX_TOASTS_PER_USER: usize = 50;

/// A toast waiting to be shown to a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub event_type: String,
    pub job_id: DbId,
    pub status: JobStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Toast {
    pub fn from_event(event: &JobEvent) -> Self {
        Self {
            event_type: event.event_type.clone(),
            job_id: event.job_id,
            status: event.status,
            message: event.summary(),
            created_at: event.timestamp,
        }
    }
}

/// Per-user toast queues.
#[derive(Default)]
pub struct InAppInbox {
    queues: RwLock<HashMap<DbId, VecDeque<Toast>>>,
}

impl InAppInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a toast for `user_id`, dropping the oldest one when full.
    pub async fn push(&self, user_id: DbId, toast: Toast) {
        let mut queues = self.queues.write().await;
        let queue = queues.entry(user_id).or_default();
        if queue.len() >= MAX_TOASTS_PER_USER {
            queue.pop_front();
            tracing::debug!(user_id, "Toast inbox full, dropped oldest toast");
        }
        queue.push_back(toast);
    }

    /// Remove and return every pending toast for `user_id`, oldest first.
    pub async fn drain(&self, user_id: DbId) -> Vec<Toast> {
        self.queues
            .write()
            .await
            .remove(&user_id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Number of pending toasts for `user_id`.
    pub async fn pending(&self, user_id: DbId) -> usize {
        self.queues
            .read()
            .await
            .get(&user_id)
            .map_or(0, VecDeque::len)
    }
}
