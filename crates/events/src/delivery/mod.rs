//! Delivery channels for job outcome notifications.
//!
//! The notification router picks channels per user; each channel here only
//! knows how to hand a [`JobEvent`](crate::JobEvent) to its medium.

pub mod email;
pub mod in_app;
