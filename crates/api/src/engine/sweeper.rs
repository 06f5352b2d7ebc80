//! Background stale-job sweeper.
//!
//! Fails claimed or running jobs that have not been updated within the
//! configured timeout, so a crashed worker never leaves a job polling
//! forever. Queued jobs are left alone while they wait for capacity.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use quill_registry::JobRegistry;
use tokio_util::sync::CancellationToken;

/// Default tick interval for the sweeper loop.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Larger timeouts are clamped to one year.
const MAX_TIMEOUT_MINS: u64 = 525_600;

/// Periodic stale-job sweep.
pub struct StaleJobSweeper {
    registry: Arc<JobRegistry>,
    interval: Duration,
    timeout: chrono::Duration,
}

impl StaleJobSweeper {
    /// Returns `None` when `timeout_mins` is zero (sweeping disabled).
    pub fn new(registry: Arc<JobRegistry>, interval: Duration, timeout_mins: u64) -> Option<Self> {
        if timeout_mins == 0 {
            return None;
        }
        let timeout_mins = timeout_mins.min(MAX_TIMEOUT_MINS) as i64;
        Some(Self {
            registry,
            interval: if interval.is_zero() {
                DEFAULT_SWEEP_INTERVAL
            } else {
                interval
            },
            timeout: chrono::Duration::minutes(timeout_mins),
        })
    }

    /// Run the sweep loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            timeout_mins = self.timeout.num_minutes(),
            "Stale job sweeper started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stale job sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let failed = self.registry.sweep_stale(self.timeout, Utc::now()).await;
                    if !failed.is_empty() {
                        tracing::warn!(count = failed.len(), job_ids = ?failed, "Failed stale jobs");
                    }
                }
            }
        }
    }
}
