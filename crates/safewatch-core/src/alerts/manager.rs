//! Alert Manager - SMS alert lifecycle and delivery

use super::delivery::summarize;
use super::gateway::{DeliveryOutcome, SmsGateway};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use safewatch_common::types::{AlertId, CampaignId, SegmentId, UserId};
use safewatch_storage::models::{
    AlertRecipient, AlertStatus, AlertType, CreateSmsAlert, DeliveryRecord, DeliveryReportEntry,
    DeliveryStatus, NewNotification, Priority, SmsAlert, UpdateSmsAlert,
};
use safewatch_storage::repository::{SmsAlertStore, SENDABLE_STATUSES};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Longest message a single SMS may carry, in characters
pub const MAX_MESSAGE_CHARS: usize = 160;

/// Alert manager errors
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("SMS alert not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Alert cannot be sent from status '{0}'")]
    NotSendable(String),

    #[error("Alert has no audience segment")]
    NoAudience,

    #[error("No eligible recipients in the audience segment")]
    NoRecipients,

    #[error("Alert is already being sent")]
    AlreadySending,

    #[error("Only draft alerts can be scheduled")]
    NotDraft,

    #[error("Only scheduled or failed alerts can be rescheduled")]
    NotReschedulable,

    #[error("Scheduled time must be in the future")]
    ScheduleNotInFuture,

    #[error("Only scheduled alerts can be cancelled")]
    NotScheduled,

    #[error("Only draft alerts can be deleted")]
    NotDeletable,

    #[error("Only draft or scheduled alerts can be edited")]
    NotEditable,

    #[error("SMS gateway failure: {0}")]
    Gateway(anyhow::Error),

    #[error(transparent)]
    Storage(#[from] safewatch_common::Error),
}

impl From<AlertError> for safewatch_common::Error {
    fn from(err: AlertError) -> Self {
        use safewatch_common::Error;

        match err {
            AlertError::Storage(e) => e,
            AlertError::NotFound => Error::not_found(err.to_string()),
            AlertError::Validation(_)
            | AlertError::NoAudience
            | AlertError::NoRecipients
            | AlertError::ScheduleNotInFuture => Error::validation(err.to_string()),
            AlertError::Gateway(e) => Error::Gateway(e.to_string()),
            AlertError::NotSendable(_)
            | AlertError::AlreadySending
            | AlertError::NotDraft
            | AlertError::NotReschedulable
            | AlertError::NotScheduled
            | AlertError::NotDeletable
            | AlertError::NotEditable => Error::invalid_state(err.to_string()),
        }
    }
}

/// Fields accepted when creating an alert
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub alert_type: String,
    pub priority: Option<String>,
    pub audience_segment_id: Option<SegmentId>,
    pub campaign_id: Option<CampaignId>,
}

/// Fields that may change while an alert is still editable
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertChanges {
    pub title: Option<String>,
    pub message: Option<String>,
    pub alert_type: Option<String>,
    pub priority: Option<String>,
    pub audience_segment_id: Option<SegmentId>,
    pub campaign_id: Option<CampaignId>,
}

/// Check the message length rule: at most 160 characters (not bytes)
pub fn validate_message(message: &str) -> Result<(), AlertError> {
    if message.trim().is_empty() {
        return Err(AlertError::Validation("Message is required".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AlertError::Validation(format!(
            "Message must be {} characters or fewer",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

/// Parse `YYYY-MM-DD` and `HH:MM[:SS]`
pub fn parse_schedule(date: &str, time: &str) -> Result<(NaiveDate, NaiveTime), AlertError> {
    let (date, time) = (date.trim(), time.trim());
    if date.is_empty() || time.is_empty() {
        return Err(AlertError::Validation(
            "scheduled_date and scheduled_time are required".to_string(),
        ));
    }

    let parsed_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AlertError::Validation(format!("Invalid scheduled_date: {}", date)))?;
    let parsed_time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .map_err(|_| AlertError::Validation(format!("Invalid scheduled_time: {}", time)))?;

    Ok((parsed_date, parsed_time))
}

fn parse_choice<T: FromStr<Err = String>>(value: &str) -> Result<T, AlertError> {
    value.trim().parse().map_err(AlertError::Validation)
}

/// Alert Manager - runs every state change of an SMS alert
pub struct AlertManager<S: SmsAlertStore> {
    store: Arc<S>,
    gateway: Arc<dyn SmsGateway>,
    cost_per_message: f64,
}

impl<S: SmsAlertStore> AlertManager<S> {
    /// Create a new alert manager
    pub fn new(store: Arc<S>, gateway: Arc<dyn SmsGateway>, cost_per_message: f64) -> Self {
        Self {
            store,
            gateway,
            cost_per_message,
        }
    }

    /// Get the backing store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    async fn load(&self, id: AlertId) -> Result<SmsAlert, AlertError> {
        self.store.get(id).await?.ok_or(AlertError::NotFound)
    }

    async fn check_references(
        &self,
        segment_id: Option<SegmentId>,
        campaign_id: Option<CampaignId>,
    ) -> Result<(), AlertError> {
        if let Some(segment_id) = segment_id {
            if !self.store.segment_exists(segment_id).await? {
                return Err(AlertError::Validation(
                    "Audience segment not found".to_string(),
                ));
            }
        }
        if let Some(campaign_id) = campaign_id {
            if !self.store.campaign_exists(campaign_id).await? {
                return Err(AlertError::Validation("Campaign not found".to_string()));
            }
        }
        Ok(())
    }

    /// Validate and store a new alert in `draft`
    pub async fn create(
        &self,
        draft: AlertDraft,
        created_by: Option<UserId>,
    ) -> Result<SmsAlert, AlertError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(AlertError::Validation("Title is required".to_string()));
        }
        validate_message(&draft.message)?;

        if draft.alert_type.trim().is_empty() {
            return Err(AlertError::Validation("Alert type is required".to_string()));
        }
        let alert_type: AlertType = parse_choice(&draft.alert_type)?;
        let priority = match draft.priority.as_deref() {
            Some(p) => parse_choice(p)?,
            None => Priority::Medium,
        };

        self.check_references(draft.audience_segment_id, draft.campaign_id)
            .await?;

        let alert = self
            .store
            .create(CreateSmsAlert {
                title: title.to_string(),
                message: draft.message,
                alert_type,
                priority,
                audience_segment_id: draft.audience_segment_id,
                campaign_id: draft.campaign_id,
                cost_per_message: self.cost_per_message,
                created_by,
            })
            .await?;

        info!(alert_id = %alert.id, alert_type = %alert.alert_type, "SMS alert created");
        Ok(alert)
    }

    /// Apply allow-listed changes while the alert is `draft` or `scheduled`
    pub async fn update(&self, id: AlertId, changes: AlertChanges) -> Result<SmsAlert, AlertError> {
        let alert = self.load(id).await?;
        if !alert
            .status_enum()
            .is_some_and(|s| SENDABLE_STATUSES.contains(&s))
        {
            return Err(AlertError::NotEditable);
        }

        let title = match changes.title.as_deref().map(str::trim) {
            Some("") => return Err(AlertError::Validation("Title is required".to_string())),
            other => other.map(str::to_string),
        };
        if let Some(message) = &changes.message {
            validate_message(message)?;
        }
        let alert_type = changes
            .alert_type
            .as_deref()
            .map(parse_choice::<AlertType>)
            .transpose()?;
        let priority = changes
            .priority
            .as_deref()
            .map(parse_choice::<Priority>)
            .transpose()?;

        self.check_references(changes.audience_segment_id, changes.campaign_id)
            .await?;

        let updated = self
            .store
            .update_editable(
                id,
                UpdateSmsAlert {
                    title,
                    message: changes.message,
                    alert_type,
                    priority,
                    audience_segment_id: changes.audience_segment_id,
                    campaign_id: changes.campaign_id,
                },
            )
            .await?
            .ok_or(AlertError::NotEditable)?;

        info!(alert_id = %id, "SMS alert updated");
        Ok(updated)
    }

    /// Send an alert to every eligible contact of its segment right now
    pub async fn send_now(&self, id: AlertId) -> Result<SmsAlert, AlertError> {
        let alert = self.load(id).await?;

        let prior = match alert.status_enum() {
            Some(status) if SENDABLE_STATUSES.contains(&status) => status,
            _ => return Err(AlertError::NotSendable(alert.status.clone())),
        };

        let segment_id = alert.audience_segment_id.ok_or(AlertError::NoAudience)?;
        let recipients = self.store.eligible_recipients(segment_id).await?;
        if recipients.is_empty() {
            return Err(AlertError::NoRecipients);
        }

        if !self.store.claim_for_send(id).await? {
            warn!(alert_id = %id, "SMS alert claimed by another sender");
            return Err(AlertError::AlreadySending);
        }

        info!(
            alert_id = %id,
            recipients = recipients.len(),
            gateway = self.gateway.name(),
            "Sending SMS alert"
        );

        let record = match self.deliver(&alert, &recipients).await {
            Ok(record) => record,
            Err(e) => {
                self.release(id, prior).await;
                return Err(e);
            }
        };

        let updated = match self.store.record_delivery(id, &record).await {
            Ok(updated) => updated,
            Err(e) => {
                self.release(id, prior).await;
                return Err(e.into());
            }
        };

        info!(
            alert_id = %id,
            status = %record.status,
            sent = record.sent_count,
            delivered = record.delivered_count,
            failed = record.failed_count,
            delivery_rate = record.delivery_rate,
            "SMS alert delivery finished"
        );

        self.notify_creator(&updated, &record).await;
        Ok(updated)
    }

    /// Submit the message to each recipient in order; failures are recorded, never retried
    async fn deliver(
        &self,
        alert: &SmsAlert,
        recipients: &[AlertRecipient],
    ) -> Result<DeliveryRecord, AlertError> {
        let mut report = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            let outcome = self
                .gateway
                .submit(recipient, &alert.message)
                .await
                .map_err(AlertError::Gateway)?;

            let (status, error) = match outcome {
                DeliveryOutcome::Delivered => (DeliveryStatus::Delivered, None),
                DeliveryOutcome::Failed { reason } => (DeliveryStatus::Failed, Some(reason)),
            };

            debug!(
                alert_id = %alert.id,
                contact_id = %recipient.contact_id,
                status = %status,
                "SMS submission"
            );

            report.push(DeliveryReportEntry {
                contact_id: recipient.contact_id,
                phone: recipient.phone.clone(),
                status,
                timestamp: Utc::now(),
                error,
            });
        }

        Ok(summarize(report, alert.cost_per_message, Utc::now()))
    }

    async fn release(&self, id: AlertId, prior: AlertStatus) {
        if let Err(e) = self.store.release_claim(id, prior).await {
            error!(alert_id = %id, error = %e, "Failed to release SMS alert claim");
        }
    }

    async fn notify_creator(&self, alert: &SmsAlert, record: &DeliveryRecord) {
        let Some(user_id) = alert.created_by else {
            return;
        };

        let (title, kind) = match record.status {
            AlertStatus::Sent => ("SMS alert sent", "success"),
            _ => ("SMS alert failed", "error"),
        };

        let notification = NewNotification {
            user_id,
            title: title.to_string(),
            message: format!(
                "'{}': {} of {} messages delivered ({:.2}%)",
                alert.title, record.delivered_count, record.sent_count, record.delivery_rate
            ),
            notification_type: kind.to_string(),
            related_alert_id: Some(alert.id),
        };

        if let Err(e) = self.store.notify(notification).await {
            warn!(alert_id = %alert.id, error = %e, "Failed to notify alert creator");
        }
    }

    /// `draft` to `scheduled` at a future date and time (UTC)
    pub async fn schedule(
        &self,
        id: AlertId,
        date: &str,
        time: &str,
        now: DateTime<Utc>,
    ) -> Result<SmsAlert, AlertError> {
        self.apply_schedule(id, date, time, now, &[AlertStatus::Draft], || AlertError::NotDraft)
            .await
    }

    /// Move a `scheduled` or `failed` alert to a new future date and time (UTC)
    pub async fn reschedule(
        &self,
        id: AlertId,
        date: &str,
        time: &str,
        now: DateTime<Utc>,
    ) -> Result<SmsAlert, AlertError> {
        self.apply_schedule(
            id,
            date,
            time,
            now,
            &[AlertStatus::Scheduled, AlertStatus::Failed],
            || AlertError::NotReschedulable,
        )
        .await
    }

    async fn apply_schedule(
        &self,
        id: AlertId,
        date: &str,
        time: &str,
        now: DateTime<Utc>,
        allowed_from: &[AlertStatus],
        wrong_state: impl Fn() -> AlertError,
    ) -> Result<SmsAlert, AlertError> {
        let alert = self.load(id).await?;
        if !alert.status_enum().is_some_and(|s| allowed_from.contains(&s)) {
            return Err(wrong_state());
        }
        if alert.audience_segment_id.is_none() {
            return Err(AlertError::NoAudience);
        }

        let (date, time) = parse_schedule(date, time)?;
        if date.and_time(time).and_utc() <= now {
            return Err(AlertError::ScheduleNotInFuture);
        }

        let updated = self
            .store
            .set_schedule(id, date, time, allowed_from)
            .await?
            .ok_or_else(wrong_state)?;

        info!(alert_id = %id, scheduled_date = %date, scheduled_time = %time, "SMS alert scheduled");
        Ok(updated)
    }

    /// `scheduled` to `cancelled`
    pub async fn cancel(&self, id: AlertId) -> Result<SmsAlert, AlertError> {
        let alert = self.load(id).await?;
        if alert.status_enum() != Some(AlertStatus::Scheduled) {
            return Err(AlertError::NotScheduled);
        }

        let cancelled = self
            .store
            .cancel(id)
            .await?
            .ok_or(AlertError::NotScheduled)?;

        info!(alert_id = %id, "SMS alert cancelled");
        Ok(cancelled)
    }

    /// `scheduled` to `failed` for an alert the dispatcher cannot deliver.
    /// It can be rescheduled once its audience is fixed.
    pub async fn mark_undeliverable(&self, id: AlertId, reason: &AlertError) -> Result<(), AlertError> {
        if self.store.fail_scheduled(id).await?.is_some() {
            warn!(alert_id = %id, reason = %reason, "Scheduled SMS alert marked failed");
        }
        Ok(())
    }

    /// Delete a draft alert
    pub async fn delete(&self, id: AlertId) -> Result<(), AlertError> {
        let alert = self.load(id).await?;
        if alert.status_enum() != Some(AlertStatus::Draft) {
            return Err(AlertError::NotDeletable);
        }

        if !self.store.delete_draft(id).await? {
            return Err(AlertError::NotDeletable);
        }

        info!(alert_id = %id, "SMS alert deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::testing::{FailingGateway, FixedGateway, MemoryStore};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn manager(store: &Arc<MemoryStore>, gateway: Arc<dyn SmsGateway>) -> AlertManager<MemoryStore> {
        AlertManager::new(Arc::clone(store), gateway, 0.05)
    }

    fn draft(segment_id: Option<SegmentId>) -> AlertDraft {
        AlertDraft {
            title: "Flood warning".to_string(),
            message: "River levels rising. Move to higher ground.".to_string(),
            alert_type: "warning".to_string(),
            priority: Some("high".to_string()),
            audience_segment_id: segment_id,
            campaign_id: None,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_three_contacts_all_delivered() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(3);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));

        let alert = manager.create(draft(Some(segment)), None).await.unwrap();
        assert_eq!(alert.status, "draft");

        let sent = manager.send_now(alert.id).await.unwrap();
        assert_eq!(sent.status, "sent");
        assert_eq!(sent.sent_count, 3);
        assert_eq!(sent.delivered_count, 3);
        assert_eq!(sent.failed_count, 0);
        assert_eq!(sent.delivery_rate, 100.0);
        assert_eq!(sent.total_cost, 0.15);
        assert!(sent.sent_at.is_some());
        assert_eq!(sent.delivery_entries().len(), 3);
    }

    #[tokio::test]
    async fn test_partial_delivery_counts_add_up() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(3);
        let failing_phone = store.recipients(segment)[1].phone.clone();
        let gateway = Arc::new(FixedGateway::failing(vec![failing_phone.clone()]));
        let manager = manager(&store, gateway.clone());

        let alert = manager.create(draft(Some(segment)), None).await.unwrap();
        let sent = manager.send_now(alert.id).await.unwrap();

        assert_eq!(sent.sent_count, 3);
        assert_eq!(sent.delivered_count + sent.failed_count, sent.sent_count);
        assert_eq!(sent.failed_count, 1);
        assert_eq!(sent.delivery_rate, 66.67);
        assert_eq!(gateway.calls(), 3);

        let entries = sent.delivery_entries();
        assert_eq!(entries[1].phone, failing_phone);
        assert_eq!(entries[1].status, DeliveryStatus::Failed);
        assert!(entries[1].error.is_some());
    }

    #[tokio::test]
    async fn test_recipients_follow_contact_order() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(4);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));

        let alert = manager.create(draft(Some(segment)), None).await.unwrap();
        let sent = manager.send_now(alert.id).await.unwrap();

        let sent_to: Vec<_> = sent.delivery_entries().into_iter().map(|e| e.contact_id).collect();
        let mut expected = sent_to.clone();
        expected.sort();
        assert_eq!(sent_to, expected);
    }

    #[tokio::test]
    async fn test_every_attempt_failing_marks_alert_failed() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(2);
        let phones = store.recipients(segment).into_iter().map(|r| r.phone).collect();
        let manager = manager(&store, Arc::new(FixedGateway::failing(phones)));

        let alert = manager.create(draft(Some(segment)), None).await.unwrap();
        let sent = manager.send_now(alert.id).await.unwrap();

        assert_eq!(sent.status, "failed");
        assert_eq!(sent.sent_count, 2);
        assert_eq!(sent.delivered_count, 0);
        assert_eq!(sent.delivery_rate, 0.0);
    }

    #[tokio::test]
    async fn test_send_from_terminal_status_leaves_alert_untouched() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(2);
        let gateway = Arc::new(FixedGateway::all_delivered());
        let manager = manager(&store, gateway.clone());

        let alert = manager.create(draft(Some(segment)), None).await.unwrap();
        manager.send_now(alert.id).await.unwrap();

        let err = manager.send_now(alert.id).await.unwrap_err();
        assert!(matches!(err, AlertError::NotSendable(ref s) if s == "sent"));

        let after = store.alert(alert.id);
        assert_eq!(after.sent_count, 2);
        assert_eq!(gateway.calls(), 2);

        for status in [AlertStatus::Cancelled, AlertStatus::Failed, AlertStatus::Sending] {
            let other = manager.create(draft(Some(segment)), None).await.unwrap();
            store.set_status(other.id, status);
            let err = manager.send_now(other.id).await.unwrap_err();
            assert!(matches!(err, AlertError::NotSendable(_)));
            assert_eq!(store.alert(other.id).sent_count, 0);
            assert_eq!(store.alert(other.id).status, status.as_str());
        }
    }

    #[tokio::test]
    async fn test_scheduled_alert_can_be_sent_now() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(1);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));

        let alert = manager.create(draft(Some(segment)), None).await.unwrap();
        manager
            .schedule(alert.id, "2030-05-02", "09:00", noon())
            .await
            .unwrap();

        let sent = manager.send_now(alert.id).await.unwrap();
        assert_eq!(sent.status, "sent");
    }

    #[tokio::test]
    async fn test_no_recipients_is_validation_error_without_mutation() {
        let store = Arc::new(MemoryStore::default());
        let empty_segment = store.add_segment(0);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));

        let alert = manager.create(draft(Some(empty_segment)), None).await.unwrap();
        let err = manager.send_now(alert.id).await.unwrap_err();
        assert!(matches!(err, AlertError::NoRecipients));
        assert_eq!(store.alert(alert.id).status, "draft");

        let no_segment = manager.create(draft(None), None).await.unwrap();
        let err = manager.send_now(no_segment.id).await.unwrap_err();
        assert!(matches!(err, AlertError::NoAudience));
    }

    #[tokio::test]
    async fn test_inactive_and_phoneless_contacts_are_skipped() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(2);
        store.add_ineligible_member(segment);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));

        let alert = manager.create(draft(Some(segment)), None).await.unwrap();
        let sent = manager.send_now(alert.id).await.unwrap();
        assert_eq!(sent.sent_count, 2);
    }

    #[tokio::test]
    async fn test_lost_claim_is_state_error() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(2);
        let gateway = Arc::new(FixedGateway::all_delivered());
        let manager = manager(&store, gateway.clone());

        let alert = manager.create(draft(Some(segment)), None).await.unwrap();
        store.block_claims();

        let err = manager.send_now(alert.id).await.unwrap_err();
        assert!(matches!(err, AlertError::AlreadySending));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_gateway_error_releases_claim() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(2);
        let manager = manager(&store, Arc::new(FailingGateway));

        let alert = manager.create(draft(Some(segment)), None).await.unwrap();
        manager
            .schedule(alert.id, "2030-05-02", "09:00", noon())
            .await
            .unwrap();

        let err = manager.send_now(alert.id).await.unwrap_err();
        assert!(matches!(err, AlertError::Gateway(_)));

        let after = store.alert(alert.id);
        assert_eq!(after.status, "scheduled");
        assert_eq!(after.sent_count, 0);
    }

    #[tokio::test]
    async fn test_creator_is_notified() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(1);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));
        let creator = uuid::Uuid::new_v4();

        let alert = manager.create(draft(Some(segment)), Some(creator)).await.unwrap();
        manager.send_now(alert.id).await.unwrap();

        let notifications = store.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].user_id, creator);
        assert_eq!(notifications[0].notification_type, "success");
        assert_eq!(notifications[0].related_alert_id, Some(alert.id));
    }

    #[tokio::test]
    async fn test_message_length_limit_counts_characters() {
        let store = Arc::new(MemoryStore::default());
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));

        let mut ok = draft(None);
        ok.message = "a".repeat(160);
        assert!(manager.create(ok, None).await.is_ok());

        let mut too_long = draft(None);
        too_long.message = "a".repeat(161);
        let err = manager.create(too_long, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Message must be 160 characters or fewer");

        let mut accented = draft(None);
        accented.message = "é".repeat(160);
        assert!(manager.create(accented, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let store = Arc::new(MemoryStore::default());
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));

        let mut no_title = draft(None);
        no_title.title = "   ".to_string();
        assert!(matches!(
            manager.create(no_title, None).await,
            Err(AlertError::Validation(_))
        ));

        let mut bad_type = draft(None);
        bad_type.alert_type = "urgent".to_string();
        let err = manager.create(bad_type, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid alert type: urgent");

        let missing_segment = draft(Some(uuid::Uuid::new_v4()));
        let err = manager.create(missing_segment, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Audience segment not found");
    }

    #[tokio::test]
    async fn test_schedule_requires_future_time() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(1);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));
        let alert = manager.create(draft(Some(segment)), None).await.unwrap();

        let err = manager
            .schedule(alert.id, "2030-05-01", "11:59", noon())
            .await
            .unwrap_err();
        assert!(matches!(err, AlertError::ScheduleNotInFuture));

        let err = manager
            .schedule(alert.id, "2030-05-01", "12:00:00", noon())
            .await
            .unwrap_err();
        assert!(matches!(err, AlertError::ScheduleNotInFuture));
        assert_eq!(store.alert(alert.id).status, "draft");

        let scheduled = manager
            .schedule(alert.id, "2030-05-01", "12:30", noon())
            .await
            .unwrap();
        assert_eq!(scheduled.status, "scheduled");
        assert_eq!(scheduled.scheduled_date, NaiveDate::from_ymd_opt(2030, 5, 1));
        assert_eq!(scheduled.scheduled_time, NaiveTime::from_hms_opt(12, 30, 0));
    }

    #[tokio::test]
    async fn test_schedule_rejects_malformed_input() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(1);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));
        let alert = manager.create(draft(Some(segment)), None).await.unwrap();

        for (date, time) in [("", "10:00"), ("05/01/2030", "10:00"), ("2030-05-01", "25:00")] {
            let err = manager.schedule(alert.id, date, time, noon()).await.unwrap_err();
            assert!(matches!(err, AlertError::Validation(_)), "{} {}", date, time);
        }
    }

    #[tokio::test]
    async fn test_schedule_requires_audience() {
        let store = Arc::new(MemoryStore::default());
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));
        let alert = manager.create(draft(None), None).await.unwrap();

        let err = manager
            .schedule(alert.id, "2030-05-02", "09:00", noon())
            .await
            .unwrap_err();
        assert!(matches!(err, AlertError::NoAudience));
        assert_eq!(store.alert(alert.id).status, "draft");

        store.set_status(alert.id, AlertStatus::Failed);
        let err = manager
            .reschedule(alert.id, "2030-05-02", "09:00", noon())
            .await
            .unwrap_err();
        assert!(matches!(err, AlertError::NoAudience));
        assert_eq!(store.alert(alert.id).status, "failed");
    }

    #[tokio::test]
    async fn test_schedule_only_from_draft_and_reschedule_from_scheduled_or_failed() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(1);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));
        let alert = manager.create(draft(Some(segment)), None).await.unwrap();

        manager
            .schedule(alert.id, "2030-05-02", "08:00", noon())
            .await
            .unwrap();
        let err = manager
            .schedule(alert.id, "2030-05-03", "08:00", noon())
            .await
            .unwrap_err();
        assert!(matches!(err, AlertError::NotDraft));

        let moved = manager
            .reschedule(alert.id, "2030-05-03", "08:00", noon())
            .await
            .unwrap();
        assert_eq!(moved.scheduled_date, NaiveDate::from_ymd_opt(2030, 5, 3));

        store.set_status(alert.id, AlertStatus::Failed);
        let retried = manager
            .reschedule(alert.id, "2030-05-04", "08:00", noon())
            .await
            .unwrap();
        assert_eq!(retried.status, "scheduled");

        let fresh = manager.create(draft(Some(segment)), None).await.unwrap();
        let err = manager
            .reschedule(fresh.id, "2030-05-04", "08:00", noon())
            .await
            .unwrap_err();
        assert!(matches!(err, AlertError::NotReschedulable));
    }

    #[tokio::test]
    async fn test_cancel_only_scheduled() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(1);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));
        let alert = manager.create(draft(Some(segment)), None).await.unwrap();

        let err = manager.cancel(alert.id).await.unwrap_err();
        assert!(matches!(err, AlertError::NotScheduled));
        assert_eq!(store.alert(alert.id).status, "draft");

        manager
            .schedule(alert.id, "2030-05-02", "08:00", noon())
            .await
            .unwrap();
        let cancelled = manager.cancel(alert.id).await.unwrap();
        assert_eq!(cancelled.status, "cancelled");
    }

    #[tokio::test]
    async fn test_delete_only_drafts() {
        let store = Arc::new(MemoryStore::default());
        let segment = store.add_segment(1);
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));

        let scheduled = manager.create(draft(Some(segment)), None).await.unwrap();
        manager
            .schedule(scheduled.id, "2030-05-02", "08:00", noon())
            .await
            .unwrap();
        let err = manager.delete(scheduled.id).await.unwrap_err();
        assert!(matches!(err, AlertError::NotDeletable));
        assert!(store.contains(scheduled.id));

        let draft_alert = manager.create(draft(Some(segment)), None).await.unwrap();
        manager.delete(draft_alert.id).await.unwrap();
        assert!(!store.contains(draft_alert.id));

        let err = manager.delete(draft_alert.id).await.unwrap_err();
        assert!(matches!(err, AlertError::NotFound));
    }

    #[tokio::test]
    async fn test_update_only_while_editable() {
        let store = Arc::new(MemoryStore::default());
        let manager = manager(&store, Arc::new(FixedGateway::all_delivered()));
        let alert = manager.create(draft(None), None).await.unwrap();

        let updated = manager
            .update(
                alert.id,
                AlertChanges {
                    title: Some("Flood watch".to_string()),
                    priority: Some("critical".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Flood watch");
        assert_eq!(updated.priority, "critical");
        assert_eq!(updated.message, alert.message);

        let err = manager
            .update(
                alert.id,
                AlertChanges {
                    message: Some("x".repeat(161)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AlertError::Validation(_)));

        store.set_status(alert.id, AlertStatus::Sent);
        let err = manager
            .update(alert.id, AlertChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AlertError::NotEditable));
    }

    #[test]
    fn test_errors_map_to_common_kinds() {
        use safewatch_common::Error;

        let err: Error = AlertError::NoRecipients.into();
        assert_eq!(err.status_code(), 400);
        let err: Error = AlertError::NotScheduled.into();
        assert_eq!(err.code(), "INVALID_STATE");
        let err: Error = AlertError::NotFound.into();
        assert_eq!(err.status_code(), 404);
        let err: Error = AlertError::Gateway(anyhow::anyhow!("down")).into();
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn test_parse_schedule_formats() {
        let (date, time) = parse_schedule("2030-01-31", "07:05").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2030, 1, 31).unwrap());
        assert_eq!(time, NaiveTime::from_hms_opt(7, 5, 0).unwrap());

        let (_, time) = parse_schedule(" 2030-01-31 ", "07:05:09").unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(7, 5, 9).unwrap());
    }
}
