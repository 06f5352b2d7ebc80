//! Quill event bus and notification delivery.
//!
//! - [`EventBus`] - in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying [`JobEvent`]s.
//! - [`delivery`] - outbound channels for job outcome notices (SMTP email
//!   and the in-app toast inbox).

pub mod bus;
pub mod delivery;

pub use bus::{EventBus, JobEvent};
pub use delivery::email::{EmailConfig, EmailDelivery};
pub use delivery::in_app::{InAppInbox, Toast};
