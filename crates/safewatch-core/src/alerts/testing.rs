//! In-memory alert store and scripted gateways for tests

use super::gateway::{DeliveryOutcome, SmsGateway};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use safewatch_common::types::{AlertId, CampaignId, SegmentId};
use safewatch_common::Result;
use safewatch_storage::models::{
    AlertRecipient, AlertStatus, CreateSmsAlert, DeliveryRecord, NewNotification, SmsAlert,
    UpdateSmsAlert,
};
use safewatch_storage::repository::SmsAlertStore;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// A segment member; only active members with a phone are eligible
#[derive(Clone)]
struct Member {
    recipient: AlertRecipient,
    eligible: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    alerts: Mutex<HashMap<AlertId, SmsAlert>>,
    segments: Mutex<HashMap<SegmentId, Vec<Member>>>,
    campaigns: Mutex<HashSet<CampaignId>>,
    notifications: Mutex<Vec<NewNotification>>,
    claims_blocked: AtomicBool,
}

impl MemoryStore {
    /// Add a segment with `eligible` active members that have phones
    pub fn add_segment(&self, eligible: usize) -> SegmentId {
        let id = Uuid::new_v4();
        let members = (0..eligible)
            .map(|i| Member {
                recipient: AlertRecipient {
                    contact_id: Uuid::new_v4(),
                    first_name: format!("Contact {}", i),
                    phone: format!("+1555010{:04}", i),
                },
                eligible: true,
            })
            .collect();
        self.segments.lock().unwrap().insert(id, members);
        id
    }

    /// Add a member that is inactive or has no phone
    pub fn add_ineligible_member(&self, segment_id: SegmentId) {
        let member = Member {
            recipient: AlertRecipient {
                contact_id: Uuid::new_v4(),
                first_name: "Inactive".to_string(),
                phone: String::new(),
            },
            eligible: false,
        };
        self.segments
            .lock()
            .unwrap()
            .entry(segment_id)
            .or_default()
            .push(member);
    }

    pub fn add_campaign(&self) -> CampaignId {
        let id = Uuid::new_v4();
        self.campaigns.lock().unwrap().insert(id);
        id
    }

    /// Eligible recipients in send order
    pub fn recipients(&self, segment_id: SegmentId) -> Vec<AlertRecipient> {
        let mut recipients: Vec<AlertRecipient> = self
            .segments
            .lock()
            .unwrap()
            .get(&segment_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| m.eligible)
                    .map(|m| m.recipient.clone())
                    .collect()
            })
            .unwrap_or_default();
        recipients.sort_by_key(|r| r.contact_id);
        recipients
    }

    pub fn alert(&self, id: AlertId) -> SmsAlert {
        self.alerts.lock().unwrap()[&id].clone()
    }

    pub fn contains(&self, id: AlertId) -> bool {
        self.alerts.lock().unwrap().contains_key(&id)
    }

    pub fn set_status(&self, id: AlertId, status: AlertStatus) {
        if let Some(alert) = self.alerts.lock().unwrap().get_mut(&id) {
            alert.status = status.to_string();
        }
    }

    /// Make every claim fail, as if another sender got there first
    pub fn block_claims(&self) {
        self.claims_blocked.store(true, Ordering::SeqCst);
    }

    pub fn notifications(&self) -> Vec<NewNotification> {
        self.notifications.lock().unwrap().clone()
    }

    fn transition(
        &self,
        id: AlertId,
        from: &[AlertStatus],
        apply: impl FnOnce(&mut SmsAlert),
    ) -> Option<SmsAlert> {
        let mut alerts = self.alerts.lock().unwrap();
        let alert = alerts.get_mut(&id)?;
        if !alert.status_enum().is_some_and(|s| from.contains(&s)) {
            return None;
        }
        apply(alert);
        alert.updated_at = Utc::now();
        Some(alert.clone())
    }
}

#[async_trait]
impl SmsAlertStore for MemoryStore {
    async fn create(&self, input: CreateSmsAlert) -> Result<SmsAlert> {
        let now = Utc::now();
        let alert = SmsAlert {
            id: Uuid::new_v4(),
            title: input.title,
            message: input.message,
            alert_type: input.alert_type.to_string(),
            priority: input.priority.to_string(),
            audience_segment_id: input.audience_segment_id,
            campaign_id: input.campaign_id,
            scheduled_date: None,
            scheduled_time: None,
            status: AlertStatus::Draft.to_string(),
            sent_count: 0,
            delivered_count: 0,
            failed_count: 0,
            delivery_rate: 0.0,
            cost_per_message: input.cost_per_message,
            total_cost: 0.0,
            delivery_report: serde_json::json!([]),
            sent_at: None,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        };
        self.alerts.lock().unwrap().insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn get(&self, id: AlertId) -> Result<Option<SmsAlert>> {
        Ok(self.alerts.lock().unwrap().get(&id).cloned())
    }

    async fn update_editable(&self, id: AlertId, input: UpdateSmsAlert) -> Result<Option<SmsAlert>> {
        Ok(self.transition(
            id,
            &[AlertStatus::Draft, AlertStatus::Scheduled],
            |alert| {
                if let Some(title) = input.title {
                    alert.title = title;
                }
                if let Some(message) = input.message {
                    alert.message = message;
                }
                if let Some(alert_type) = input.alert_type {
                    alert.alert_type = alert_type.to_string();
                }
                if let Some(priority) = input.priority {
                    alert.priority = priority.to_string();
                }
                if input.audience_segment_id.is_some() {
                    alert.audience_segment_id = input.audience_segment_id;
                }
                if input.campaign_id.is_some() {
                    alert.campaign_id = input.campaign_id;
                }
            },
        ))
    }

    async fn segment_exists(&self, id: SegmentId) -> Result<bool> {
        Ok(self.segments.lock().unwrap().contains_key(&id))
    }

    async fn campaign_exists(&self, id: CampaignId) -> Result<bool> {
        Ok(self.campaigns.lock().unwrap().contains(&id))
    }

    async fn eligible_recipients(&self, segment_id: SegmentId) -> Result<Vec<AlertRecipient>> {
        Ok(self.recipients(segment_id))
    }

    async fn claim_for_send(&self, id: AlertId) -> Result<bool> {
        if self.claims_blocked.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self
            .transition(id, &[AlertStatus::Draft, AlertStatus::Scheduled], |alert| {
                alert.status = AlertStatus::Sending.to_string();
            })
            .is_some())
    }

    async fn release_claim(&self, id: AlertId, prior: AlertStatus) -> Result<()> {
        self.transition(id, &[AlertStatus::Sending], |alert| {
            alert.status = prior.to_string();
        });
        Ok(())
    }

    async fn record_delivery(&self, id: AlertId, record: &DeliveryRecord) -> Result<SmsAlert> {
        let mut alerts = self.alerts.lock().unwrap();
        let alert = alerts
            .get_mut(&id)
            .ok_or_else(|| safewatch_common::Error::not_found("SMS alert not found"))?;
        alert.status = record.status.to_string();
        alert.sent_count = record.sent_count;
        alert.delivered_count = record.delivered_count;
        alert.failed_count = record.failed_count;
        alert.delivery_rate = record.delivery_rate;
        alert.total_cost = record.total_cost;
        alert.delivery_report = serde_json::to_value(&record.report).unwrap();
        alert.sent_at = Some(record.sent_at);
        Ok(alert.clone())
    }

    async fn set_schedule(
        &self,
        id: AlertId,
        date: NaiveDate,
        time: NaiveTime,
        allowed_from: &[AlertStatus],
    ) -> Result<Option<SmsAlert>> {
        Ok(self.transition(id, allowed_from, |alert| {
            alert.status = AlertStatus::Scheduled.to_string();
            alert.scheduled_date = Some(date);
            alert.scheduled_time = Some(time);
        }))
    }

    async fn cancel(&self, id: AlertId) -> Result<Option<SmsAlert>> {
        Ok(self.transition(id, &[AlertStatus::Scheduled], |alert| {
            alert.status = AlertStatus::Cancelled.to_string();
        }))
    }

    async fn fail_scheduled(&self, id: AlertId) -> Result<Option<SmsAlert>> {
        Ok(self.transition(id, &[AlertStatus::Scheduled], |alert| {
            alert.status = AlertStatus::Failed.to_string();
        }))
    }

    async fn delete_draft(&self, id: AlertId) -> Result<bool> {
        let mut alerts = self.alerts.lock().unwrap();
        let is_draft = alerts
            .get(&id)
            .is_some_and(|a| a.status_enum() == Some(AlertStatus::Draft));
        if is_draft {
            alerts.remove(&id);
        }
        Ok(is_draft)
    }

    async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<SmsAlert>> {
        let mut due: Vec<SmsAlert> = self
            .alerts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.status_enum() == Some(AlertStatus::Scheduled))
            .filter(|a| a.scheduled_at().is_some_and(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|a| a.scheduled_at());
        Ok(due)
    }

    async fn notify(&self, notification: NewNotification) -> Result<()> {
        self.notifications.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Gateway that fails a fixed set of phone numbers and delivers the rest
#[derive(Default)]
pub struct FixedGateway {
    failing: Vec<String>,
    calls: AtomicUsize,
}

impl FixedGateway {
    pub fn all_delivered() -> Self {
        Self::default()
    }

    pub fn failing(phones: Vec<String>) -> Self {
        Self {
            failing: phones,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SmsGateway for FixedGateway {
    async fn submit(
        &self,
        recipient: &AlertRecipient,
        _message: &str,
    ) -> anyhow::Result<DeliveryOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&recipient.phone) {
            Ok(DeliveryOutcome::failed("Number unreachable"))
        } else {
            Ok(DeliveryOutcome::Delivered)
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Gateway whose transport is down
pub struct FailingGateway;

#[async_trait]
impl SmsGateway for FailingGateway {
    async fn submit(
        &self,
        _recipient: &AlertRecipient,
        _message: &str,
    ) -> anyhow::Result<DeliveryOutcome> {
        Err(anyhow::anyhow!("connection refused"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
