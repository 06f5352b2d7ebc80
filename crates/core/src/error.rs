use crate::generation_job::JobStatus;
use crate::readiness::VectorStoreStatus;
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Job {job_id} is already {status}")]
    AlreadyTerminal { job_id: DbId, status: JobStatus },

    #[error("Character {character_id} vector store is {}", .status.status)]
    NotReady {
        character_id: DbId,
        status: Box<VectorStoreStatus>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
