//! Hand-off to the external worker pool.
//!
//! The registry never waits on workers: [`WorkQueue::enqueue`] and
//! [`WorkQueue::abort`] must return without blocking. Workers report back
//! through the registry's `report_*` methods.

use quill_core::types::DbId;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Error raised when the worker queue refuses a command.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Worker queue is closed")]
    Closed,
}

/// Work item describing one chapter generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItem {
    pub task_id: Uuid,
    pub job_id: DbId,
    pub user_id: DbId,
    pub trilogy_id: DbId,
    pub character_id: DbId,
    pub sub_chapter_id: DbId,
    pub priority: i32,
    pub parameters: serde_json::Value,
}

/// Commands understood by the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    Run(WorkItem),
    /// Best-effort abort of a previously enqueued task.
    Abort(Uuid),
}

/// Non-blocking seam to the worker pool.
pub trait WorkQueue: Send + Sync {
    /// Submit a work item. `item.task_id` is the id the worker will use.
    fn enqueue(&self, item: WorkItem) -> Result<Uuid, QueueError>;

    /// Ask the worker running `task_id` to stop.
    fn abort(&self, task_id: Uuid) -> Result<(), QueueError>;
}

/// [`WorkQueue`] backed by an unbounded `tokio::sync::mpsc` channel.
///
/// The receiving half is handed to whatever drives the worker pool.
pub struct ChannelWorkQueue {
    sender: mpsc::UnboundedSender<WorkerCommand>,
}

impl ChannelWorkQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkerCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl WorkQueue for ChannelWorkQueue {
    fn enqueue(&self, item: WorkItem) -> Result<Uuid, QueueError> {
        let task_id = item.task_id;
        self.sender
            .send(WorkerCommand::Run(item))
            .map_err(|_| QueueError::Closed)?;
        Ok(task_id)
    }

    fn abort(&self, task_id: Uuid) -> Result<(), QueueError> {
        self.sender
            .send(WorkerCommand::Abort(task_id))
            .map_err(|_| QueueError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn item() -> WorkItem {
        WorkItem {
            task_id: Uuid::new_v4(),
            job_id: 1,
            user_id: 2,
            trilogy_id: 3,
            character_id: 4,
            sub_chapter_id: 5,
            priority: 0,
            parameters: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn enqueue_and_abort_reach_receiver_in_order() {
        let (queue, mut rx) = ChannelWorkQueue::new();
        let work = item();
        let task_id = queue.enqueue(work.clone()).unwrap();
        queue.abort(task_id).unwrap();

        assert_eq!(rx.recv().await, Some(WorkerCommand::Run(work)));
        assert_eq!(rx.recv().await, Some(WorkerCommand::Abort(task_id)));
    }

    #[test]
    fn closed_queue_reports_error() {
        let (queue, rx) = ChannelWorkQueue::new();
        drop(rx);
        assert_matches!(queue.enqueue(item()), Err(QueueError::Closed));
    }
}
