use std::sync::Arc;

use quill_core::generation_job::{NewGenerationJob, ResultMetadata, JOB_TYPE_CHAPTER_GENERATION};
use quill_core::polling::PollBackoff;
use quill_core::readiness::{VectorStoreReport, VectorStoreState};
use quill_core::types::DbId;
use quill_events::EventBus;
use quill_registry::{ChannelWorkQueue, InMemoryVectorStores, JobRegistry, ReadinessGate, WorkerCommand};
use tokio::sync::mpsc::UnboundedReceiver;

/// Character whose vector store is reported ready by [`harness`].
pub const READY_CHARACTER: DbId = 1;

/// Character that has never been initialized.
pub const UNKNOWN_CHARACTER: DbId = 99;

pub struct Harness {
    pub registry: Arc<JobRegistry>,
    pub stores: Arc<InMemoryVectorStores>,
    pub bus: Arc<EventBus>,
    pub worker_rx: UnboundedReceiver<WorkerCommand>,
}

/// Registry wired to in-memory collaborators, with [`READY_CHARACTER`] ready.
pub async fn harness() -> Harness {
    let stores = Arc::new(InMemoryVectorStores::new());
    stores
        .report(READY_CHARACTER, ready_report(VectorStoreState::Ready))
        .await;

    let (queue, worker_rx) = ChannelWorkQueue::new();
    let bus = Arc::new(EventBus::default());
    let registry = Arc::new(JobRegistry::new(
        ReadinessGate::new(stores.clone()),
        Arc::new(queue),
        bus.clone(),
        PollBackoff::default(),
    ));

    Harness {
        registry,
        stores,
        bus,
        worker_rx,
    }
}

pub fn ready_report(status: VectorStoreState) -> VectorStoreReport {
    VectorStoreReport {
        status,
        collection_id: Some("character_1".into()),
        embedding_count: Some(240),
        initialized_at: None,
        error_message: None,
    }
}

pub fn new_job(character_id: DbId, sub_chapter_id: DbId) -> NewGenerationJob {
    NewGenerationJob {
        trilogy_id: 3,
        character_id,
        sub_chapter_id,
        job_type: JOB_TYPE_CHAPTER_GENERATION.into(),
        priority: None,
        parameters: None,
    }
}

pub fn metadata(word_count: u32) -> ResultMetadata {
    ResultMetadata {
        word_count,
        version_id: 71,
        version_number: 1,
        model: "writer-large".into(),
    }
}
