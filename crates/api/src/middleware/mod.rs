//! Authentication extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`auth::WorkerAuth`] -- Requires the shared worker callback token.

pub mod auth;
