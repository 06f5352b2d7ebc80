//! Event-to-notification routing engine.
//!
//! [`NotificationRouter`] subscribes to the event bus and delivers each
//! terminal job event to the job's owner according to their notification
//! preferences.

use std::sync::Arc;

use quill_events::{EmailDelivery, InAppInbox, JobEvent, Toast};
use quill_registry::NotificationPreferenceStore;
use tokio::sync::broadcast;

/// Routes job events to user notifications.
///
/// Delivery failures are logged and never affect job state.
pub struct NotificationRouter {
    preferences: Arc<NotificationPreferenceStore>,
    inbox: Arc<InAppInbox>,
    /// `None` when SMTP is not configured.
    email: Option<EmailDelivery>,
}

impl NotificationRouter {
    pub fn new(
        preferences: Arc<NotificationPreferenceStore>,
        inbox: Arc<InAppInbox>,
        email: Option<EmailDelivery>,
    ) -> Self {
        Self {
            preferences,
            inbox,
            email,
        }
    }

    /// Run the main routing loop.
    ///
    /// The loop exits when the channel is closed (i.e. every
    /// [`EventBus`](quill_events::EventBus) handle is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.route_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Evaluate the owner's preferences and deliver one event.
    pub async fn route_event(&self, event: &JobEvent) {
        let (prefs, decision) = self
            .preferences
            .should_notify(event.user_id, event.status, event.duration())
            .await;

        if !decision.any() {
            tracing::debug!(
                job_id = event.job_id,
                user_id = event.user_id,
                event_type = %event.event_type,
                "Notification suppressed by preferences",
            );
            return;
        }

        if decision.toast {
            self.inbox.push(event.user_id, Toast::from_event(event)).await;
        }

        if decision.email {
            match (&self.email, prefs.recipient_email()) {
                (Some(delivery), Some(to)) => {
                    if let Err(e) = delivery.deliver(to, event).await {
                        tracing::error!(
                            job_id = event.job_id,
                            user_id = event.user_id,
                            error = %e,
                            "Failed to send job outcome email",
                        );
                    }
                }
                (None, _) => {
                    tracing::debug!(job_id = event.job_id, "Email delivery not configured");
                }
                (Some(_), None) => {
                    tracing::debug!(
                        job_id = event.job_id,
                        user_id = event.user_id,
                        "No email address on file, skipping email",
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use quill_core::generation_job::JobStatus;
    use quill_core::notification::UpdateNotificationPreferences;
    use quill_events::EventBus;

    use super::*;

    fn event(status: JobStatus, duration_secs: i64) -> JobEvent {
        let event_type = match status {
            JobStatus::Completed => "job.completed",
            JobStatus::Failed => "job.failed",
            _ => "job.cancelled",
        };
        JobEvent {
            event_type: event_type.into(),
            job_id: 21,
            user_id: 4,
            status,
            trilogy_id: 1,
            sub_chapter_id: 2,
            duration_secs,
            payload: serde_json::json!({"result": {"word_count": 950}}),
            timestamp: Utc::now(),
        }
    }

    fn router() -> (NotificationRouter, Arc<NotificationPreferenceStore>, Arc<InAppInbox>) {
        let prefs = Arc::new(NotificationPreferenceStore::new());
        let inbox = Arc::new(InAppInbox::new());
        (
            NotificationRouter::new(prefs.clone(), inbox.clone(), None),
            prefs,
            inbox,
        )
    }

    #[tokio::test]
    async fn completion_lands_in_inbox_by_default() {
        let (router, _, inbox) = router();
        router.route_event(&event(JobStatus::Completed, 60)).await;

        let toasts = inbox.drain(4).await;
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].message, "Chapter generation #21 finished (950 words)");
    }

    #[tokio::test]
    async fn cancellation_is_not_announced_by_default() {
        let (router, _, inbox) = router();
        router.route_event(&event(JobStatus::Cancelled, 60)).await;
        assert_eq!(inbox.pending(4).await, 0);
    }

    #[tokio::test]
    async fn long_running_override_notifies_when_success_is_off() {
        let (router, prefs, inbox) = router();
        let update: UpdateNotificationPreferences = serde_json::from_value(serde_json::json!({
            "notify_on_success": false,
            "notify_on_long_running": true,
            "long_running_threshold_minutes": 10,
        }))
        .unwrap();
        prefs.update_preferences(4, update).await.unwrap();

        router.route_event(&event(JobStatus::Completed, 5 * 60)).await;
        assert_eq!(inbox.pending(4).await, 0);

        router.route_event(&event(JobStatus::Completed, 15 * 60)).await;
        assert_eq!(inbox.pending(4).await, 1);
    }

    #[tokio::test]
    async fn run_loop_exits_when_bus_is_dropped() {
        let (router, _, inbox) = router();
        let bus = EventBus::default();
        let handle = tokio::spawn(router.run(bus.subscribe()));

        bus.publish(event(JobStatus::Failed, 30));
        drop(bus);
        handle.await.unwrap();

        assert_eq!(inbox.pending(4).await, 1);
    }
}
