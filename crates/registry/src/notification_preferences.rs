//! Per-user notification preference store.
//!
//! Records are created lazily with defaults on first read and are never
//! deleted.

use std::collections::HashMap;

use chrono::Utc;
use quill_core::error::CoreError;
use quill_core::generation_job::JobStatus;
use quill_core::notification::{
    self, NotificationDecision, NotificationPreferences, UpdateNotificationPreferences,
};
use quill_core::types::DbId;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct NotificationPreferenceStore {
    prefs: RwLock<HashMap<DbId, NotificationPreferences>>,
}

impl NotificationPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preferences for `user_id`, creating the default record if needed.
    pub async fn get_preferences(&self, user_id: DbId) -> NotificationPreferences {
        if let Some(prefs) = self.prefs.read().await.get(&user_id) {
            return prefs.clone();
        }
        self.prefs
            .write()
            .await
            .entry(user_id)
            .or_insert_with(|| NotificationPreferences::defaults(user_id, Utc::now()))
            .clone()
    }

    /// Apply a partial update. Nothing changes if validation fails.
    pub async fn update_preferences(
        &self,
        user_id: DbId,
        update: UpdateNotificationPreferences,
    ) -> Result<NotificationPreferences, CoreError> {
        update.validate()?;
        let now = Utc::now();
        let mut prefs = self.prefs.write().await;
        let entry = prefs
            .entry(user_id)
            .or_insert_with(|| NotificationPreferences::defaults(user_id, now));
        entry.apply(update, now);
        tracing::info!(user_id, "Notification preferences updated");
        Ok(entry.clone())
    }

    /// Remember the address carried by the user's identity token.
    pub async fn record_account_email(&self, user_id: DbId, email: &str) {
        let known = self
            .prefs
            .read()
            .await
            .get(&user_id)
            .is_some_and(|p| p.account_email.as_deref() == Some(email));
        if known {
            return;
        }
        let mut prefs = self.prefs.write().await;
        let entry = prefs
            .entry(user_id)
            .or_insert_with(|| NotificationPreferences::defaults(user_id, Utc::now()));
        if entry.account_email.as_deref() != Some(email) {
            tracing::debug!(user_id, "Account email recorded");
            entry.account_email = Some(email.to_string());
        }
    }

    /// Channel decision for a terminal outcome of one of `user_id`'s jobs.
    pub async fn should_notify(
        &self,
        user_id: DbId,
        outcome: JobStatus,
        job_duration: chrono::Duration,
    ) -> (NotificationPreferences, NotificationDecision) {
        let prefs = self.get_preferences(user_id).await;
        let decision = notification::should_notify(&prefs, outcome, job_duration);
        (prefs, decision)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn first_read_creates_defaults() {
        let store = NotificationPreferenceStore::new();
        let prefs = store.get_preferences(4).await;
        assert!(prefs.email_enabled);
        assert!(!prefs.notify_on_long_running);
        assert_eq!(prefs.long_running_threshold_minutes, 10);
    }

    #[tokio::test]
    async fn partial_update_only_touches_supplied_fields() {
        let store = NotificationPreferenceStore::new();
        let update: UpdateNotificationPreferences =
            serde_json::from_str(r#"{"toast_enabled": false}"#).unwrap();
        let prefs = store.update_preferences(4, update).await.unwrap();
        assert!(!prefs.toast_enabled);
        assert!(prefs.email_enabled);
        assert!(prefs.notify_on_success);
    }

    #[tokio::test]
    async fn invalid_update_changes_nothing() {
        let store = NotificationPreferenceStore::new();
        let update: UpdateNotificationPreferences = serde_json::from_str(
            r#"{"toast_enabled": false, "long_running_threshold_minutes": 0}"#,
        )
        .unwrap();
        assert_matches!(
            store.update_preferences(4, update).await,
            Err(CoreError::Validation(_))
        );
        assert!(store.get_preferences(4).await.toast_enabled);
    }

    #[tokio::test]
    async fn contact_email_overrides_account_email_until_cleared() {
        let store = NotificationPreferenceStore::new();
        store.record_account_email(4, "writer@example.com").await;

        let set: UpdateNotificationPreferences =
            serde_json::from_str(r#"{"contact_email": "alerts@example.com"}"#).unwrap();
        let prefs = store.update_preferences(4, set).await.unwrap();
        assert_eq!(prefs.recipient_email(), Some("alerts@example.com"));

        let clear: UpdateNotificationPreferences =
            serde_json::from_str(r#"{"contact_email": null}"#).unwrap();
        let prefs = store.update_preferences(4, clear).await.unwrap();
        assert_eq!(prefs.recipient_email(), Some("writer@example.com"));
    }

    #[tokio::test]
    async fn cancellation_is_silent_by_default() {
        let store = NotificationPreferenceStore::new();
        let (_, decision) = store
            .should_notify(4, JobStatus::Cancelled, chrono::Duration::hours(2))
            .await;
        assert!(!decision.any());
    }
}
