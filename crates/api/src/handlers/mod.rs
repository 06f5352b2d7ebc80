//! Request handlers.
//!
//! Each submodule provides async handler functions for one resource.
//! Handlers delegate to the stores in `quill_registry` and map errors via
//! [`AppError`](crate::error::AppError).

pub mod characters;
pub mod generation_jobs;
pub mod notifications;
pub mod worker;
