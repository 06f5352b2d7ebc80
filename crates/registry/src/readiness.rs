//! Vector readiness gate.
//!
//! The embedding subsystem is the source of truth for per-character vector
//! store status. The gate reads it on every admission with no caching of
//! its own, so a stale answer can only cause a spurious rejection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use quill_core::error::CoreError;
use quill_core::readiness::{VectorStoreReport, VectorStoreStatus};
use quill_core::types::DbId;
use tokio::sync::RwLock;

/// Read access to the embedding subsystem's status records.
#[async_trait]
pub trait VectorStoreSource: Send + Sync {
    /// Current status for `character_id`; unknown characters are
    /// `not_initialized`.
    async fn status(&self, character_id: DbId) -> Result<VectorStoreStatus, CoreError>;
}

/// In-process status table fed by the embedding subsystem's callbacks.
#[derive(Default)]
pub struct InMemoryVectorStores {
    statuses: RwLock<HashMap<DbId, VectorStoreStatus>>,
}

impl InMemoryVectorStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status report for `character_id`, replacing the previous one.
    pub async fn report(&self, character_id: DbId, report: VectorStoreReport) -> VectorStoreStatus {
        let status = VectorStoreStatus::from_report(character_id, report);
        tracing::info!(
            character_id,
            status = %status.status,
            embedding_count = ?status.embedding_count,
            "Vector store status reported",
        );
        self.statuses
            .write()
            .await
            .insert(character_id, status.clone());
        status
    }
}

#[async_trait]
impl VectorStoreSource for InMemoryVectorStores {
    async fn status(&self, character_id: DbId) -> Result<VectorStoreStatus, CoreError> {
        Ok(self
            .statuses
            .read()
            .await
            .get(&character_id)
            .cloned()
            .unwrap_or_else(|| VectorStoreStatus::not_initialized(character_id)))
    }
}

/// Admission check in front of job creation.
#[derive(Clone)]
pub struct ReadinessGate {
    source: Arc<dyn VectorStoreSource>,
}

impl ReadinessGate {
    pub fn new(source: Arc<dyn VectorStoreSource>) -> Self {
        Self { source }
    }

    /// Current vector store status for `character_id`.
    pub async fn check_readiness(&self, character_id: DbId) -> Result<VectorStoreStatus, CoreError> {
        self.source.status(character_id).await
    }

    /// Fail with `NotReady` unless the character's store can serve generation.
    pub async fn ensure_ready(&self, character_id: DbId) -> Result<VectorStoreStatus, CoreError> {
        let status = self.check_readiness(character_id).await?;
        status.ensure_can_generate()?;
        Ok(status)
    }
}
