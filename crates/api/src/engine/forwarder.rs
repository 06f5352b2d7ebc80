//! Forwards queued worker commands to the external worker pool over HTTP.
//!
//! The job registry only pushes onto an in-process channel; this task
//! drains it and talks to the pool so no request handler ever waits on a
//! worker. A failed hand-off leaves the job `queued`. Every request is
//! bounded by the client timeout so a stalled pool cannot hold up later
//! commands.

use std::time::Duration;

use quill_registry::{WorkItem, WorkerCommand};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Errors from the worker pool HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The pool returned a non-2xx status code.
    #[error("Worker pool error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// HTTP client for the worker pool.
pub struct WorkerPoolClient {
    client: reqwest::Client,
    base_url: String,
}

impl WorkerPoolClient {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// * `base_url` - e.g. `http://workers:9000`, without a trailing slash.
    /// * `timeout` - upper bound for each request, connect through body.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, WorkerPoolError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// `POST /tasks` with the work item.
    pub async fn submit(&self, item: &WorkItem) -> Result<(), WorkerPoolError> {
        let response = self
            .client
            .post(format!("{}/tasks", self.base_url))
            .json(item)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// `POST /tasks/{task_id}/abort`.
    pub async fn abort(&self, task_id: Uuid) -> Result<(), WorkerPoolError> {
        let response = self
            .client
            .post(format!("{}/tasks/{task_id}/abort", self.base_url))
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<(), WorkerPoolError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(WorkerPoolError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

/// Background task draining the worker command channel.
pub struct WorkerForwarder {
    /// `None` when no pool is configured; commands are then dropped with a
    /// warning.
    client: Option<WorkerPoolClient>,
}

impl WorkerForwarder {
    pub fn new(client: Option<WorkerPoolClient>) -> Self {
        Self { client }
    }

    /// Run until every sender (the registry's queue) is dropped.
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<WorkerCommand>) {
        if self.client.is_none() {
            tracing::warn!("WORKER_POOL_URL not set, generation jobs will not be dispatched");
        }

        while let Some(command) = receiver.recv().await {
            self.forward(command).await;
        }
        tracing::info!("Worker command channel closed, forwarder shutting down");
    }

    async fn forward(&self, command: WorkerCommand) {
        let Some(client) = &self.client else {
            match command {
                WorkerCommand::Run(item) => {
                    tracing::warn!(job_id = item.job_id, "No worker pool, job left queued");
                }
                WorkerCommand::Abort(task_id) => {
                    tracing::debug!(%task_id, "No worker pool, abort dropped");
                }
            }
            return;
        };

        match command {
            WorkerCommand::Run(item) => match client.submit(&item).await {
                Ok(()) => {
                    tracing::info!(
                        job_id = item.job_id,
                        task_id = %item.task_id,
                        "Work item handed to worker pool",
                    );
                }
                Err(e) => {
                    tracing::error!(
                        job_id = item.job_id,
                        task_id = %item.task_id,
                        error = %e,
                        "Failed to hand work item to worker pool",
                    );
                }
            },
            WorkerCommand::Abort(task_id) => {
                if let Err(e) = client.abort(task_id).await {
                    tracing::warn!(%task_id, error = %e, "Failed to signal worker abort");
                }
            }
        }
    }
}
