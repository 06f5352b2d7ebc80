//! Domain types and pure logic for the Quill generation service.
//!
//! Nothing in this crate touches shared state or I/O: the job state
//! machine, poll projection, readiness check and notification decision
//! all take their inputs (including the current time) as arguments.

pub mod error;
pub mod generation_job;
pub mod job_events;
pub mod notification;
pub mod polling;
pub mod readiness;
pub mod scheduling;
pub mod types;
