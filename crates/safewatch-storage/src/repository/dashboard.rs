//! Read-only aggregates for the dashboard

use chrono::{DateTime, Duration, Utc};
use safewatch_common::types::round2;
use safewatch_common::Result;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::db::db_failure;
use crate::models::{AlertStatus, CampaignEvent, CampaignMilestone, MilestoneStatus, SmsAlert};

/// Number of rows sharing a status
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Headline counts across every resource
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OverviewCounts {
    pub total_campaigns: i64,
    pub active_campaigns: i64,
    pub total_contacts: i64,
    pub active_contacts: i64,
    pub total_segments: i64,
    pub total_surveys: i64,
    pub active_surveys: i64,
    pub total_responses: i64,
    pub total_users: i64,
    pub total_alerts: i64,
    pub messages_sent: i64,
    pub messages_delivered: i64,
    pub messages_failed: i64,
    pub total_sms_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardOverview {
    #[serde(flatten)]
    pub counts: OverviewCounts,
    pub sms_delivery_rate: f64,
    pub campaigns_by_status: Vec<StatusCount>,
}

/// A recently created campaign, alert or survey
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActivityItem {
    pub kind: String,
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CampaignPerformance {
    pub campaign_id: Uuid,
    pub name: String,
    pub status: String,
    pub alerts: i64,
    pub messages_sent: i64,
    pub messages_delivered: i64,
    pub delivery_rate: f64,
    pub surveys: i64,
    pub responses: i64,
}

/// Work due inside the lookahead window
#[derive(Debug, Clone, Serialize)]
pub struct UpcomingItems {
    pub alerts: Vec<SmsAlert>,
    pub milestones: Vec<CampaignMilestone>,
    pub events: Vec<CampaignEvent>,
}

/// Dashboard repository
#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn overview(&self) -> Result<DashboardOverview> {
        let counts = sqlx::query_as::<_, OverviewCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM campaigns) AS total_campaigns,
                (SELECT COUNT(*) FROM campaigns WHERE status = 'active') AS active_campaigns,
                (SELECT COUNT(*) FROM contacts) AS total_contacts,
                (SELECT COUNT(*) FROM contacts WHERE status = 'active') AS active_contacts,
                (SELECT COUNT(*) FROM segments) AS total_segments,
                (SELECT COUNT(*) FROM surveys) AS total_surveys,
                (SELECT COUNT(*) FROM surveys WHERE status = 'active') AS active_surveys,
                (SELECT COUNT(*) FROM survey_responses) AS total_responses,
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM sms_alerts) AS total_alerts,
                (SELECT COALESCE(SUM(sent_count), 0)::bigint FROM sms_alerts) AS messages_sent,
                (SELECT COALESCE(SUM(delivered_count), 0)::bigint FROM sms_alerts) AS messages_delivered,
                (SELECT COALESCE(SUM(failed_count), 0)::bigint FROM sms_alerts) AS messages_failed,
                (SELECT COALESCE(SUM(total_cost), 0)::float8 FROM sms_alerts) AS total_sms_cost
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to load dashboard overview"))?;

        let campaigns_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM campaigns GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to load dashboard overview"))?;

        let sms_delivery_rate = if counts.messages_sent > 0 {
            round2(counts.messages_delivered as f64 / counts.messages_sent as f64 * 100.0)
        } else {
            0.0
        };

        Ok(DashboardOverview {
            counts: OverviewCounts {
                total_sms_cost: round2(counts.total_sms_cost),
                ..counts
            },
            sms_delivery_rate,
            campaigns_by_status,
        })
    }

    /// Latest created campaigns, alerts and surveys merged, newest first
    pub async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityItem>> {
        sqlx::query_as::<_, ActivityItem>(
            r#"
            SELECT * FROM (
                SELECT 'campaign' AS kind, id, name AS title, status, created_at FROM campaigns
                UNION ALL
                SELECT 'sms_alert' AS kind, id, title, status, created_at FROM sms_alerts
                UNION ALL
                SELECT 'survey' AS kind, id, title, status, created_at FROM surveys
            ) activity
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to load recent activity"))
    }

    /// Alert and survey results per campaign, archived campaigns excluded
    pub async fn campaign_performance(&self) -> Result<Vec<CampaignPerformance>> {
        sqlx::query_as::<_, CampaignPerformance>(
            r#"
            SELECT
                campaign_id, name, status, alerts, messages_sent, messages_delivered,
                CASE WHEN messages_sent > 0
                    THEN ROUND(messages_delivered::numeric * 100 / messages_sent, 2)::float8
                    ELSE 0
                END AS delivery_rate,
                surveys, responses
            FROM (
                SELECT
                    c.id AS campaign_id,
                    c.name,
                    c.status,
                    c.created_at,
                    (SELECT COUNT(*) FROM sms_alerts a WHERE a.campaign_id = c.id) AS alerts,
                    (SELECT COALESCE(SUM(a.sent_count), 0)::bigint
                        FROM sms_alerts a WHERE a.campaign_id = c.id) AS messages_sent,
                    (SELECT COALESCE(SUM(a.delivered_count), 0)::bigint
                        FROM sms_alerts a WHERE a.campaign_id = c.id) AS messages_delivered,
                    (SELECT COUNT(*) FROM surveys s WHERE s.campaign_id = c.id) AS surveys,
                    (SELECT COUNT(*) FROM survey_responses r
                        JOIN surveys s ON s.id = r.survey_id
                        WHERE s.campaign_id = c.id) AS responses
                FROM campaigns c
                WHERE c.status <> 'archived'
            ) per_campaign
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to load campaign performance"))
    }

    /// Scheduled alerts, pending milestones and events in `[now, now + days]`
    pub async fn upcoming(&self, now: DateTime<Utc>, days: i64) -> Result<UpcomingItems> {
        let until = now + Duration::days(days);

        let alerts = sqlx::query_as::<_, SmsAlert>(
            r#"
            SELECT * FROM sms_alerts
            WHERE status = $1
              AND scheduled_date + scheduled_time BETWEEN $2 AND $3
            ORDER BY scheduled_date, scheduled_time
            "#,
        )
        .bind(AlertStatus::Scheduled.to_string())
        .bind(now.naive_utc())
        .bind(until.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to load upcoming alerts"))?;

        let milestones = sqlx::query_as::<_, CampaignMilestone>(
            r#"
            SELECT * FROM campaign_milestones
            WHERE status = $1 AND due_date BETWEEN $2 AND $3
            ORDER BY due_date
            "#,
        )
        .bind(MilestoneStatus::Pending.to_string())
        .bind(now.date_naive())
        .bind(until.date_naive())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to load upcoming milestones"))?;

        let events = sqlx::query_as::<_, CampaignEvent>(
            r#"
            SELECT * FROM campaign_events
            WHERE event_date BETWEEN $1 AND $2
            ORDER BY event_date
            "#,
        )
        .bind(now)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to load upcoming events"))?;

        Ok(UpcomingItems {
            alerts,
            milestones,
            events,
        })
    }
}
