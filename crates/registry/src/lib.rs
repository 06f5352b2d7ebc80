//! In-process stores and services around generation jobs.
//!
//! - [`JobRegistry`] - owns every job record; serializes mutations per job
//!   and exposes the create / report / poll / cancel contract.
//! - [`ReadinessGate`] - reads character vector store status before
//!   admission.
//! - [`JobListProjector`] - cached, paginated job summaries.
//! - [`NotificationPreferenceStore`] - per-user delivery settings.
//! - [`WorkQueue`] - seam to the external worker pool.

pub mod job_list;
pub mod job_registry;
pub mod notification_preferences;
pub mod queue;
pub mod readiness;

pub use job_list::{JobList, JobListProjector, JobListQuery, JobSummary};
pub use job_registry::{CancelResult, JobRegistry};
pub use notification_preferences::NotificationPreferenceStore;
pub use queue::{ChannelWorkQueue, QueueError, WorkItem, WorkQueue, WorkerCommand};
pub use readiness::{InMemoryVectorStores, ReadinessGate, VectorStoreSource};
