//! Background tasks.
//!
//! - [`forwarder::WorkerForwarder`] -- hands queued work to the worker pool.
//! - [`sweeper::StaleJobSweeper`] -- fails jobs that stopped reporting.

pub mod forwarder;
pub mod sweeper;

pub use forwarder::{WorkerForwarder, WorkerPoolClient};
pub use sweeper::StaleJobSweeper;
