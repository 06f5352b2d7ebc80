use std::sync::Arc;
use std::time::Duration;

use quill_events::{EventBus, InAppInbox};
use quill_registry::{
    InMemoryVectorStores, JobListProjector, JobRegistry, NotificationPreferenceStore,
    ReadinessGate, WorkQueue,
};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Owner of every generation job.
    pub registry: Arc<JobRegistry>,
    /// Cached job listings.
    pub job_list: Arc<JobListProjector>,
    /// Vector store status table fed by the embedding subsystem.
    pub vector_stores: Arc<InMemoryVectorStores>,
    /// Readiness gate over `vector_stores`.
    pub readiness: ReadinessGate,
    /// Per-user notification preferences.
    pub preferences: Arc<NotificationPreferenceStore>,
    /// Undelivered in-app toasts.
    pub inbox: Arc<InAppInbox>,
    /// Event bus for terminal job events.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the in-process stores together around `queue`.
    pub fn new(config: ServerConfig, queue: Arc<dyn WorkQueue>) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let vector_stores = Arc::new(InMemoryVectorStores::new());
        let readiness = ReadinessGate::new(vector_stores.clone());

        let registry = Arc::new(JobRegistry::new(
            readiness.clone(),
            queue,
            Arc::clone(&event_bus),
            config.poll_backoff,
        ));
        let job_list = Arc::new(JobListProjector::new(
            Arc::clone(&registry),
            Duration::from_secs(config.job_list_cache_ttl_secs),
        ));

        Self {
            config: Arc::new(config),
            registry,
            job_list,
            vector_stores,
            readiness,
            preferences: Arc::new(NotificationPreferenceStore::new()),
            inbox: Arc::new(InAppInbox::new()),
            event_bus,
        }
    }
}
