//! Per-character vector store readiness.
//!
//! The embedding subsystem owns these records; the generation service only
//! reads them to decide whether a job may be admitted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// VectorStoreState
// ---------------------------------------------------------------------------

/// Lifecycle state of a character's vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreState {
    NotInitialized,
    Initializing,
    Ready,
    Updating,
    Failed,
}

impl VectorStoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Updating => "updating",
            Self::Failed => "failed",
        }
    }

    /// Generation may run against a ready store or one being refreshed.
    pub fn can_generate(&self) -> bool {
        matches!(self, Self::Ready | Self::Updating)
    }
}

impl fmt::Display for VectorStoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// VectorStoreStatus
// ---------------------------------------------------------------------------

/// Readiness snapshot for one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VectorStoreStatus {
    pub character_id: DbId,
    pub status: VectorStoreState,
    pub collection_id: Option<String>,
    pub embedding_count: Option<u64>,
    pub can_generate: bool,
    pub initialized_at: Option<Timestamp>,
    pub error_message: Option<String>,
}

impl VectorStoreStatus {
    /// Status reported for characters the embedding subsystem never touched.
    pub fn not_initialized(character_id: DbId) -> Self {
        Self::from_report(
            character_id,
            VectorStoreReport {
                status: VectorStoreState::NotInitialized,
                collection_id: None,
                embedding_count: None,
                initialized_at: None,
                error_message: None,
            },
        )
    }

    /// Build a snapshot from an embedding-subsystem report, deriving
    /// `can_generate` from the state.
    pub fn from_report(character_id: DbId, report: VectorStoreReport) -> Self {
        Self {
            character_id,
            can_generate: report.status.can_generate(),
            status: report.status,
            collection_id: report.collection_id,
            embedding_count: report.embedding_count,
            initialized_at: report.initialized_at,
            error_message: report.error_message,
        }
    }

    /// Admission check used before a job is created.
    pub fn ensure_can_generate(&self) -> Result<(), CoreError> {
        if self.can_generate {
            Ok(())
        } else {
            Err(CoreError::NotReady {
                character_id: self.character_id,
                status: Box::new(self.clone()),
            })
        }
    }
}

/// Status update pushed by the embedding subsystem.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreReport {
    pub status: VectorStoreState,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub embedding_count: Option<u64>,
    #[serde(default)]
    pub initialized_at: Option<Timestamp>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn report(status: VectorStoreState) -> VectorStoreReport {
        VectorStoreReport {
            status,
            collection_id: Some("char_2_v1".into()),
            embedding_count: Some(420),
            initialized_at: None,
            error_message: None,
        }
    }

    #[test]
    fn only_ready_and_updating_can_generate() {
        assert!(VectorStoreState::Ready.can_generate());
        assert!(VectorStoreState::Updating.can_generate());
        assert!(!VectorStoreState::NotInitialized.can_generate());
        assert!(!VectorStoreState::Initializing.can_generate());
        assert!(!VectorStoreState::Failed.can_generate());
    }

    #[test]
    fn unknown_character_is_not_initialized() {
        let status = VectorStoreStatus::not_initialized(9);
        assert_eq!(status.status, VectorStoreState::NotInitialized);
        assert!(!status.can_generate);
        assert!(status.collection_id.is_none());
    }

    #[test]
    fn not_ready_error_carries_status() {
        let status = VectorStoreStatus::from_report(2, report(VectorStoreState::Failed));
        let err = status.ensure_can_generate().unwrap_err();
        assert_matches!(
            err,
            CoreError::NotReady { character_id: 2, ref status } if status.status == VectorStoreState::Failed
        );
    }

    #[test]
    fn ready_store_admits() {
        let status = VectorStoreStatus::from_report(2, report(VectorStoreState::Ready));
        assert!(status.ensure_can_generate().is_ok());
    }

    #[test]
    fn serializes_snake_case_state() {
        let status = VectorStoreStatus::from_report(2, report(VectorStoreState::Updating));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "updating");
        assert_eq!(json["can_generate"], true);
        assert_eq!(json["embedding_count"], 420);
    }
}
