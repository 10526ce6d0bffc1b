//! SMS alert repository

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use safewatch_common::types::{round2, AlertId, CampaignId, PageParams, SegmentId};
use safewatch_common::Result;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::like_pattern;
use crate::db::db_failure;
use crate::models::{
    AlertRecipient, AlertStatus, ContactStatus, CreateSmsAlert, DeliveryRecord, NewNotification,
    SmsAlert, SmsAlertFilter, UpdateSmsAlert,
};

/// Statuses from which an alert may be sent or edited
pub const SENDABLE_STATUSES: [AlertStatus; 2] = [AlertStatus::Draft, AlertStatus::Scheduled];

/// Storage operations behind the alert lifecycle.
///
/// Every state change is a conditional update on the current status, so two
/// callers racing on the same alert cannot both win.
#[async_trait]
pub trait SmsAlertStore: Send + Sync {
    /// Create an alert in `draft`
    async fn create(&self, input: CreateSmsAlert) -> Result<SmsAlert>;

    /// Get an alert by ID
    async fn get(&self, id: AlertId) -> Result<Option<SmsAlert>>;

    /// Update content fields while the alert is `draft` or `scheduled`
    async fn update_editable(&self, id: AlertId, input: UpdateSmsAlert) -> Result<Option<SmsAlert>>;

    async fn segment_exists(&self, id: SegmentId) -> Result<bool>;

    async fn campaign_exists(&self, id: CampaignId) -> Result<bool>;

    /// Active contacts with a phone number in the segment, ordered by contact id
    async fn eligible_recipients(&self, segment_id: SegmentId) -> Result<Vec<AlertRecipient>>;

    /// Move the alert to `sending` if it is still `draft` or `scheduled`
    async fn claim_for_send(&self, id: AlertId) -> Result<bool>;

    /// Put a claimed alert back to the status it had before the claim
    async fn release_claim(&self, id: AlertId, prior: AlertStatus) -> Result<()>;

    /// Persist the outcome of a send
    async fn record_delivery(&self, id: AlertId, record: &DeliveryRecord) -> Result<SmsAlert>;

    /// Set the schedule and status `scheduled` if the alert is in one of `allowed_from`
    async fn set_schedule(
        &self,
        id: AlertId,
        date: NaiveDate,
        time: NaiveTime,
        allowed_from: &[AlertStatus],
    ) -> Result<Option<SmsAlert>>;

    /// `scheduled` to `cancelled`
    async fn cancel(&self, id: AlertId) -> Result<Option<SmsAlert>>;

    /// `scheduled` to `failed`, for a due alert that has nobody to reach
    async fn fail_scheduled(&self, id: AlertId) -> Result<Option<SmsAlert>>;

    /// Delete the alert if it is still a draft
    async fn delete_draft(&self, id: AlertId) -> Result<bool>;

    /// Scheduled alerts whose date and time (UTC) are at or before `now`
    async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<SmsAlert>>;

    async fn notify(&self, notification: NewNotification) -> Result<()>;
}

/// Alert with the names of the records it references
#[derive(Debug, Clone, Serialize)]
pub struct SmsAlertDetail {
    #[serde(flatten)]
    pub alert: SmsAlert,
    pub segment_name: Option<String>,
    pub campaign_name: Option<String>,
}

/// Aggregates over alerts that finished sending
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct AlertTotals {
    pub total_alerts: i64,
    pub total_sent: i64,
    pub total_delivered: i64,
    pub total_failed: i64,
    pub average_delivery_rate: f64,
    pub total_cost: f64,
}

/// Per-group alert counts
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct AlertBreakdown {
    pub key: String,
    pub alerts: i64,
    pub sent: i64,
    pub delivered: i64,
}

/// PostgreSQL SMS alert repository
#[derive(Clone)]
pub struct DbSmsAlertRepository {
    pool: PgPool,
}

impl DbSmsAlertRepository {
    /// Create a new repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List alerts matching a filter, newest first
    pub async fn list(
        &self,
        filter: &SmsAlertFilter,
        page: PageParams,
    ) -> Result<(Vec<SmsAlert>, i64)> {
        let search = like_pattern(filter.search.as_deref());
        let status = filter.status.map(|s| s.to_string());
        let alert_type = filter.alert_type.map(|t| t.to_string());
        let priority = filter.priority.map(|p| p.to_string());

        let alerts = sqlx::query_as::<_, SmsAlert>(
            r#"
            SELECT * FROM sms_alerts
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR alert_type = $2)
              AND ($3::text IS NULL OR priority = $3)
              AND ($4::uuid IS NULL OR campaign_id = $4)
              AND ($5::text IS NULL OR title ILIKE $5 OR message ILIKE $5)
            ORDER BY created_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(&status)
        .bind(&alert_type)
        .bind(&priority)
        .bind(filter.campaign_id)
        .bind(&search)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list SMS alerts"))?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM sms_alerts
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR alert_type = $2)
              AND ($3::text IS NULL OR priority = $3)
              AND ($4::uuid IS NULL OR campaign_id = $4)
              AND ($5::text IS NULL OR title ILIKE $5 OR message ILIKE $5)
            "#,
        )
        .bind(&status)
        .bind(&alert_type)
        .bind(&priority)
        .bind(filter.campaign_id)
        .bind(&search)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to count SMS alerts"))?;

        Ok((alerts, total.0))
    }

    /// Get an alert with its segment and campaign names
    pub async fn detail(&self, id: AlertId) -> Result<Option<SmsAlertDetail>> {
        let Some(alert) = SmsAlertStore::get(self, id).await? else {
            return Ok(None);
        };

        let names: (Option<String>, Option<String>) = sqlx::query_as(
            r#"
            SELECT
                (SELECT name FROM segments WHERE id = $1),
                (SELECT name FROM campaigns WHERE id = $2)
            "#,
        )
        .bind(alert.audience_segment_id)
        .bind(alert.campaign_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to get SMS alert"))?;

        Ok(Some(SmsAlertDetail {
            alert,
            segment_name: names.0,
            campaign_name: names.1,
        }))
    }

    /// Totals across `sent` and `failed` alerts
    pub async fn totals(&self) -> Result<AlertTotals> {
        let mut totals = sqlx::query_as::<_, AlertTotals>(
            r#"
            SELECT
                COUNT(*) AS total_alerts,
                COALESCE(SUM(sent_count), 0)::bigint AS total_sent,
                COALESCE(SUM(delivered_count), 0)::bigint AS total_delivered,
                COALESCE(SUM(failed_count), 0)::bigint AS total_failed,
                COALESCE(AVG(delivery_rate), 0)::float8 AS average_delivery_rate,
                COALESCE(SUM(total_cost), 0)::float8 AS total_cost
            FROM sms_alerts
            WHERE status IN ('sent', 'failed')
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to load SMS analytics"))?;

        totals.average_delivery_rate = round2(totals.average_delivery_rate);
        totals.total_cost = round2(totals.total_cost);
        Ok(totals)
    }

    /// Sent and failed alerts grouped by type
    pub async fn breakdown_by_type(&self) -> Result<Vec<AlertBreakdown>> {
        sqlx::query_as::<_, AlertBreakdown>(
            r#"
            SELECT
                alert_type AS key,
                COUNT(*) AS alerts,
                COALESCE(SUM(sent_count), 0)::bigint AS sent,
                COALESCE(SUM(delivered_count), 0)::bigint AS delivered
            FROM sms_alerts
            WHERE status IN ('sent', 'failed')
            GROUP BY alert_type
            ORDER BY alert_type
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to load SMS analytics"))
    }

    /// Every alert grouped by status
    pub async fn breakdown_by_status(&self) -> Result<Vec<AlertBreakdown>> {
        sqlx::query_as::<_, AlertBreakdown>(
            r#"
            SELECT
                status AS key,
                COUNT(*) AS alerts,
                COALESCE(SUM(sent_count), 0)::bigint AS sent,
                COALESCE(SUM(delivered_count), 0)::bigint AS delivered
            FROM sms_alerts
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to load SMS analytics"))
    }
}

fn status_texts(statuses: &[AlertStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl SmsAlertStore for DbSmsAlertRepository {
    async fn create(&self, input: CreateSmsAlert) -> Result<SmsAlert> {
        sqlx::query_as::<_, SmsAlert>(
            r#"
            INSERT INTO sms_alerts (
                id, title, message, alert_type, priority, audience_segment_id,
                campaign_id, status, cost_per_message, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.title)
        .bind(&input.message)
        .bind(input.alert_type.to_string())
        .bind(input.priority.to_string())
        .bind(input.audience_segment_id)
        .bind(input.campaign_id)
        .bind(AlertStatus::Draft.to_string())
        .bind(input.cost_per_message)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to create SMS alert"))
    }

    async fn get(&self, id: AlertId) -> Result<Option<SmsAlert>> {
        sqlx::query_as::<_, SmsAlert>("SELECT * FROM sms_alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("Failed to get SMS alert"))
    }

    async fn update_editable(&self, id: AlertId, input: UpdateSmsAlert) -> Result<Option<SmsAlert>> {
        sqlx::query_as::<_, SmsAlert>(
            r#"
            UPDATE sms_alerts SET
                title = COALESCE($2, title),
                message = COALESCE($3, message),
                alert_type = COALESCE($4, alert_type),
                priority = COALESCE($5, priority),
                audience_segment_id = COALESCE($6, audience_segment_id),
                campaign_id = COALESCE($7, campaign_id),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.message)
        .bind(input.alert_type.map(|t| t.to_string()))
        .bind(input.priority.map(|p| p.to_string()))
        .bind(input.audience_segment_id)
        .bind(input.campaign_id)
        .bind(status_texts(&SENDABLE_STATUSES))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_failure("Failed to update SMS alert"))
    }

    async fn segment_exists(&self, id: SegmentId) -> Result<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM segments WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_failure("Failed to check segment"))?;
        Ok(row.0)
    }

    async fn campaign_exists(&self, id: CampaignId) -> Result<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM campaigns WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_failure("Failed to check campaign"))?;
        Ok(row.0)
    }

    async fn eligible_recipients(&self, segment_id: SegmentId) -> Result<Vec<AlertRecipient>> {
        sqlx::query_as::<_, AlertRecipient>(
            r#"
            SELECT c.id AS contact_id, c.first_name, BTRIM(c.phone) AS phone
            FROM contacts c
            JOIN segment_contacts sc ON sc.contact_id = c.id
            WHERE sc.segment_id = $1
              AND c.status = $2
              AND c.phone IS NOT NULL AND BTRIM(c.phone) <> ''
            ORDER BY c.id
            "#,
        )
        .bind(segment_id)
        .bind(ContactStatus::Active.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to resolve alert recipients"))
    }

    async fn claim_for_send(&self, id: AlertId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sms_alerts SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id)
        .bind(AlertStatus::Sending.to_string())
        .bind(status_texts(&SENDABLE_STATUSES))
        .execute(&self.pool)
        .await
        .map_err(db_failure("Failed to claim SMS alert"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(&self, id: AlertId, prior: AlertStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sms_alerts SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(id)
        .bind(prior.to_string())
        .bind(AlertStatus::Sending.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_failure("Failed to release SMS alert"))?;
        Ok(())
    }

    async fn record_delivery(&self, id: AlertId, record: &DeliveryRecord) -> Result<SmsAlert> {
        let report = serde_json::to_value(&record.report)
            .map_err(|e| safewatch_common::Error::Internal(e.to_string()))?;

        sqlx::query_as::<_, SmsAlert>(
            r#"
            UPDATE sms_alerts SET
                status = $2,
                sent_count = $3,
                delivered_count = $4,
                failed_count = $5,
                delivery_rate = $6,
                total_cost = $7,
                delivery_report = $8,
                sent_at = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(record.status.to_string())
        .bind(record.sent_count)
        .bind(record.delivered_count)
        .bind(record.failed_count)
        .bind(record.delivery_rate)
        .bind(record.total_cost)
        .bind(report)
        .bind(record.sent_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to record SMS delivery"))
    }

    async fn set_schedule(
        &self,
        id: AlertId,
        date: NaiveDate,
        time: NaiveTime,
        allowed_from: &[AlertStatus],
    ) -> Result<Option<SmsAlert>> {
        sqlx::query_as::<_, SmsAlert>(
            r#"
            UPDATE sms_alerts SET
                status = $2,
                scheduled_date = $3,
                scheduled_time = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(AlertStatus::Scheduled.to_string())
        .bind(date)
        .bind(time)
        .bind(status_texts(allowed_from))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_failure("Failed to schedule SMS alert"))
    }

    async fn cancel(&self, id: AlertId) -> Result<Option<SmsAlert>> {
        sqlx::query_as::<_, SmsAlert>(
            r#"
            UPDATE sms_alerts SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(AlertStatus::Cancelled.to_string())
        .bind(AlertStatus::Scheduled.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_failure("Failed to cancel SMS alert"))
    }

    async fn fail_scheduled(&self, id: AlertId) -> Result<Option<SmsAlert>> {
        sqlx::query_as::<_, SmsAlert>(
            r#"
            UPDATE sms_alerts SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(AlertStatus::Failed.to_string())
        .bind(AlertStatus::Scheduled.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_failure("Failed to mark SMS alert as failed"))
    }

    async fn delete_draft(&self, id: AlertId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sms_alerts WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(AlertStatus::Draft.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_failure("Failed to delete SMS alert"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<SmsAlert>> {
        sqlx::query_as::<_, SmsAlert>(
            r#"
            SELECT * FROM sms_alerts
            WHERE status = $1
              AND scheduled_date IS NOT NULL
              AND scheduled_time IS NOT NULL
              AND scheduled_date + scheduled_time <= $2
            ORDER BY scheduled_date, scheduled_time
            "#,
        )
        .bind(AlertStatus::Scheduled.to_string())
        .bind(now.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to load due SMS alerts"))
    }

    async fn notify(&self, notification: NewNotification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, title, message, notification_type, related_alert_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.notification_type)
        .bind(notification.related_alert_id)
        .execute(&self.pool)
        .await
        .map_err(db_failure("Failed to create notification"))?;
        Ok(())
    }
}
