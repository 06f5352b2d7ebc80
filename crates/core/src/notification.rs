//! Notification preferences and the outcome-notification decision.
//!
//! Preferences are a flat per-user record created lazily with the
//! defaults below. [`should_notify`] is the single place that combines the
//! stored flags with a job's terminal outcome and duration.

use serde::{Deserialize, Deserializer, Serialize};
use validator::ValidateEmail;

use crate::error::CoreError;
use crate::generation_job::JobStatus;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default long-running threshold in minutes.
pub const DEFAULT_LONG_RUNNING_THRESHOLD_MINS: u32 = 10;

/// Upper bound for the long-running threshold (one day).
pub const MAX_LONG_RUNNING_THRESHOLD_MINS: u32 = 1440;

/// Maximum length of a contact email address.
pub const MAX_EMAIL_LENGTH: usize = 254;

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

/// Per-user delivery settings for job outcome notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPreferences {
    pub user_id: DbId,
    pub email_enabled: bool,
    pub toast_enabled: bool,
    pub notify_on_success: bool,
    pub notify_on_failure: bool,
    pub notify_on_long_running: bool,
    pub long_running_threshold_minutes: u32,
    pub notify_on_cancellation: bool,
    /// Overrides the account email when set.
    pub contact_email: Option<String>,
    /// Address from the authenticated identity.
    pub account_email: Option<String>,
    pub updated_at: Timestamp,
}

impl NotificationPreferences {
    /// Default preferences for a user seen for the first time.
    pub fn defaults(user_id: DbId, now: Timestamp) -> Self {
        Self {
            user_id,
            email_enabled: true,
            toast_enabled: true,
            notify_on_success: true,
            notify_on_failure: true,
            notify_on_long_running: false,
            long_running_threshold_minutes: DEFAULT_LONG_RUNNING_THRESHOLD_MINS,
            notify_on_cancellation: false,
            contact_email: None,
            account_email: None,
            updated_at: now,
        }
    }

    /// Address email notifications go to, if any.
    pub fn recipient_email(&self) -> Option<&str> {
        self.contact_email
            .as_deref()
            .or(self.account_email.as_deref())
    }

    /// Apply a partial update. Fields absent from `update` are unchanged.
    pub fn apply(&mut self, update: UpdateNotificationPreferences, now: Timestamp) {
        if let Some(v) = update.email_enabled {
            self.email_enabled = v;
        }
        if let Some(v) = update.toast_enabled {
            self.toast_enabled = v;
        }
        if let Some(v) = update.notify_on_success {
            self.notify_on_success = v;
        }
        if let Some(v) = update.notify_on_failure {
            self.notify_on_failure = v;
        }
        if let Some(v) = update.notify_on_long_running {
            self.notify_on_long_running = v;
        }
        if let Some(v) = update.long_running_threshold_minutes {
            self.long_running_threshold_minutes = v;
        }
        if let Some(v) = update.notify_on_cancellation {
            self.notify_on_cancellation = v;
        }
        if let Some(v) = update.contact_email {
            self.contact_email = v;
        }
        self.updated_at = now;
    }
}

/// Partial update for [`NotificationPreferences`].
///
/// `contact_email` distinguishes "absent" (unchanged) from an explicit
/// `null` (cleared, falling back to the account email).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNotificationPreferences {
    pub email_enabled: Option<bool>,
    pub toast_enabled: Option<bool>,
    pub notify_on_success: Option<bool>,
    pub notify_on_failure: Option<bool>,
    pub notify_on_long_running: Option<bool>,
    pub long_running_threshold_minutes: Option<u32>,
    pub notify_on_cancellation: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub contact_email: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl UpdateNotificationPreferences {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(mins) = self.long_running_threshold_minutes {
            validate_threshold_minutes(mins)?;
        }
        if let Some(Some(email)) = &self.contact_email {
            validate_contact_email(email)?;
        }
        Ok(())
    }
}

/// Validate the long-running threshold is within `1..=1440` minutes.
pub fn validate_threshold_minutes(mins: u32) -> Result<(), CoreError> {
    if mins == 0 || mins > MAX_LONG_RUNNING_THRESHOLD_MINS {
        return Err(CoreError::Validation(format!(
            "long_running_threshold_minutes must be between 1 and \
             {MAX_LONG_RUNNING_THRESHOLD_MINS}, got {mins}"
        )));
    }
    Ok(())
}

/// Validate a contact email override.
pub fn validate_contact_email(email: &str) -> Result<(), CoreError> {
    if email.len() > MAX_EMAIL_LENGTH || !email.validate_email() {
        return Err(CoreError::Validation(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Channels a terminal outcome should be delivered on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationDecision {
    pub email: bool,
    pub toast: bool,
}

impl NotificationDecision {
    pub fn any(&self) -> bool {
        self.email || self.toast
    }
}

/// Decide whether and where to notify a user about a terminal outcome.
///
/// - `completed` follows `notify_on_success`, `failed` follows
///   `notify_on_failure`, `cancelled` follows `notify_on_cancellation`.
/// - With `notify_on_long_running` set, a completed or failed job whose
///   duration reached the threshold is notified even when its outcome
///   flag is off.
/// - Non-terminal statuses never notify.
pub fn should_notify(
    prefs: &NotificationPreferences,
    outcome: JobStatus,
    job_duration: chrono::Duration,
) -> NotificationDecision {
    let long_running = prefs.notify_on_long_running
        && job_duration
            >= chrono::Duration::minutes(i64::from(prefs.long_running_threshold_minutes));

    let wanted = match outcome {
        JobStatus::Completed => prefs.notify_on_success || long_running,
        JobStatus::Failed => prefs.notify_on_failure || long_running,
        JobStatus::Cancelled => prefs.notify_on_cancellation,
        JobStatus::Queued | JobStatus::Pending | JobStatus::InProgress => false,
    };

    NotificationDecision {
        email: wanted && prefs.email_enabled,
        toast: wanted && prefs.toast_enabled,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn prefs() -> NotificationPreferences {
        NotificationPreferences::defaults(1, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn defaults_notify_success_and_failure_on_both_channels() {
        let p = prefs();
        let both = NotificationDecision {
            email: true,
            toast: true,
        };
        assert_eq!(should_notify(&p, JobStatus::Completed, Duration::zero()), both);
        assert_eq!(should_notify(&p, JobStatus::Failed, Duration::zero()), both);
    }

    #[test]
    fn cancellation_is_silent_by_default() {
        let decision = should_notify(&prefs(), JobStatus::Cancelled, Duration::hours(2));
        assert!(!decision.any());
    }

    #[test]
    fn cancellation_notices_can_be_requested() {
        let mut p = prefs();
        p.notify_on_cancellation = true;
        p.email_enabled = false;
        let decision = should_notify(&p, JobStatus::Cancelled, Duration::zero());
        assert!(!decision.email);
        assert!(decision.toast);
    }

    #[test]
    fn long_running_overrides_disabled_success_flag() {
        let mut p = prefs();
        p.notify_on_success = false;
        p.notify_on_long_running = true;

        assert!(!should_notify(&p, JobStatus::Completed, Duration::minutes(9)).any());
        assert!(should_notify(&p, JobStatus::Completed, Duration::minutes(10)).any());
    }

    #[test]
    fn long_running_does_not_apply_to_cancellation() {
        let mut p = prefs();
        p.notify_on_long_running = true;
        assert!(!should_notify(&p, JobStatus::Cancelled, Duration::hours(5)).any());
    }

    #[test]
    fn non_terminal_status_never_notifies() {
        assert!(!should_notify(&prefs(), JobStatus::InProgress, Duration::hours(1)).any());
    }

    #[test]
    fn channel_flags_gate_delivery() {
        let mut p = prefs();
        p.email_enabled = false;
        p.toast_enabled = false;
        assert!(!should_notify(&p, JobStatus::Failed, Duration::zero()).any());
    }

    #[test]
    fn contact_email_overrides_account_email() {
        let mut p = prefs();
        assert_eq!(p.recipient_email(), None);
        p.account_email = Some("writer@example.com".into());
        assert_eq!(p.recipient_email(), Some("writer@example.com"));
        p.contact_email = Some("alerts@example.com".into());
        assert_eq!(p.recipient_email(), Some("alerts@example.com"));
    }

    #[test]
    fn partial_update_changes_only_supplied_fields() {
        let mut p = prefs();
        let update: UpdateNotificationPreferences =
            serde_json::from_str(r#"{"notify_on_success": false}"#).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        p.apply(update, later);

        assert!(!p.notify_on_success);
        assert!(p.notify_on_failure);
        assert!(p.email_enabled);
        assert_eq!(p.updated_at, later);
    }

    #[test]
    fn explicit_null_clears_contact_email() {
        let mut p = prefs();
        p.contact_email = Some("alerts@example.com".into());

        let absent: UpdateNotificationPreferences = serde_json::from_str("{}").unwrap();
        assert!(absent.contact_email.is_none());
        p.apply(absent, p.updated_at);
        assert!(p.contact_email.is_some());

        let cleared: UpdateNotificationPreferences =
            serde_json::from_str(r#"{"contact_email": null}"#).unwrap();
        assert_eq!(cleared.contact_email, Some(None));
        p.apply(cleared, p.updated_at);
        assert!(p.contact_email.is_none());
    }

    #[test]
    fn invalid_email_rejected() {
        let update = UpdateNotificationPreferences {
            contact_email: Some(Some("not-an-email".into())),
            ..Default::default()
        };
        assert_matches!(update.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn threshold_bounds_enforced() {
        assert!(validate_threshold_minutes(0).is_err());
        assert!(validate_threshold_minutes(1).is_ok());
        assert!(validate_threshold_minutes(1440).is_ok());
        assert!(validate_threshold_minutes(1441).is_err());
    }
}
