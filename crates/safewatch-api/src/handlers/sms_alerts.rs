//! SMS alert handlers
//!
//! `/api/sms-alerts`: list, detail, delivery_status, analytics, create,
//! send_now, schedule, reschedule, cancel, update and delete.

use axum::{extract::State, http::Method, response::IntoResponse};
use chrono::{DateTime, Utc};
use safewatch_common::types::{AlertId, Pagination};
use safewatch_common::Error;
use safewatch_core::{AlertChanges, AlertDraft};
use safewatch_storage::models::{DeliveryReportEntry, SmsAlertFilter};
use safewatch_storage::repository::{AlertBreakdown, AlertTotals};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::AppState;
use crate::request::ApiRequest;
use crate::response::{ApiResponse, ApiResult};

/// Delivery counters and the per-contact report of one alert
#[derive(Debug, Serialize)]
pub struct DeliveryStatusView {
    pub id: AlertId,
    pub status: String,
    pub sent_count: i32,
    pub delivered_count: i32,
    pub failed_count: i32,
    pub delivery_rate: f64,
    pub cost_per_message: f64,
    pub total_cost: f64,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivery_report: Vec<DeliveryReportEntry>,
}

#[derive(Debug, Serialize)]
pub struct AlertAnalytics {
    #[serde(flatten)]
    pub totals: AlertTotals,
    pub by_type: Vec<AlertBreakdown>,
    pub by_status: Vec<AlertBreakdown>,
}

#[derive(Debug, Default, Deserialize)]
struct ScheduleRequest {
    #[serde(default)]
    scheduled_date: String,
    #[serde(default)]
    scheduled_time: String,
}

pub async fn handle(State(state): State<Arc<AppState>>, req: ApiRequest) -> ApiResult {
    match (req.method(), req.crud_action()) {
        (&Method::GET, "list") => list(&state, &req).await,
        (&Method::GET, "detail") => detail(&state, &req).await,
        (&Method::GET, "delivery_status") => delivery_status(&state, &req).await,
        (&Method::GET, "analytics") => analytics(&state).await,
        (&Method::POST, "create") => create(&state, &req).await,
        (&Method::POST, "send_now") => send_now(&state, &req).await,
        (&Method::POST, "schedule") => schedule(&state, &req, false).await,
        (&Method::POST, "reschedule") => schedule(&state, &req, true).await,
        (&Method::POST, "cancel") => cancel(&state, &req).await,
        (&Method::PUT, "update") => update(&state, &req).await,
        (&Method::DELETE, "delete") => delete(&state, &req).await,
        _ => Err(req.unknown_action()),
    }
}

/// The target alert: `alert_id`, falling back to `id`
fn alert_id(req: &ApiRequest) -> Result<AlertId, Error> {
    match req.uuid("alert_id")? {
        Some(id) => Ok(id),
        None => req
            .uuid("id")?
            .ok_or_else(|| Error::validation("alert_id is required")),
    }
}

async fn list(state: &AppState, req: &ApiRequest) -> ApiResult {
    let filter = SmsAlertFilter {
        status: req.parse_param("status")?,
        alert_type: req.parse_param("alert_type")?,
        priority: req.parse_param("priority")?,
        campaign_id: req.uuid("campaign_id")?,
        search: req.param("search").map(str::to_string),
    };
    let page = req.page();

    let (alerts, total) = state.alerts.store().list(&filter, page).await?;
    Ok(ApiResponse::paginated(alerts, Pagination::new(page, total)).into_response())
}

async fn detail(state: &AppState, req: &ApiRequest) -> ApiResult {
    let detail = state
        .alerts
        .store()
        .detail(req.id()?)
        .await?
        .ok_or_else(|| Error::not_found("SMS alert not found"))?;
    Ok(ApiResponse::ok(detail).into_response())
}

async fn delivery_status(state: &AppState, req: &ApiRequest) -> ApiResult {
    let alert = state
        .alerts
        .store()
        .detail(alert_id(req)?)
        .await?
        .ok_or_else(|| Error::not_found("SMS alert not found"))?
        .alert;

    let delivery_report = alert.delivery_entries();
    Ok(ApiResponse::ok(DeliveryStatusView {
        id: alert.id,
        status: alert.status,
        sent_count: alert.sent_count,
        delivered_count: alert.delivered_count,
        failed_count: alert.failed_count,
        delivery_rate: alert.delivery_rate,
        cost_per_message: alert.cost_per_message,
        total_cost: alert.total_cost,
        sent_at: alert.sent_at,
        delivery_report,
    })
    .into_response())
}

async fn analytics(state: &AppState) -> ApiResult {
    let store = state.alerts.store();
    let analytics = AlertAnalytics {
        totals: store.totals().await?,
        by_type: store.breakdown_by_type().await?,
        by_status: store.breakdown_by_status().await?,
    };
    Ok(ApiResponse::ok(analytics).into_response())
}

async fn create(state: &AppState, req: &ApiRequest) -> ApiResult {
    let draft: AlertDraft = req.body()?;
    let alert = state.alerts.create(draft, state.actor(req)).await?;
    Ok(ApiResponse::created(alert)
        .with_message("SMS alert created")
        .into_response())
}

async fn send_now(state: &AppState, req: &ApiRequest) -> ApiResult {
    let alert = state.alerts.send_now(alert_id(req)?).await?;
    let message = format!(
        "SMS alert sent: {} of {} messages delivered",
        alert.delivered_count, alert.sent_count
    );
    Ok(ApiResponse::ok(alert).with_message(message).into_response())
}

async fn schedule(state: &AppState, req: &ApiRequest, reschedule: bool) -> ApiResult {
    let id = alert_id(req)?;
    let body: ScheduleRequest = req.body()?;
    let now = Utc::now();

    let alert = if reschedule {
        state
            .alerts
            .reschedule(id, &body.scheduled_date, &body.scheduled_time, now)
            .await?
    } else {
        state
            .alerts
            .schedule(id, &body.scheduled_date, &body.scheduled_time, now)
            .await?
    };

    let message = if reschedule {
        "SMS alert rescheduled"
    } else {
        "SMS alert scheduled"
    };
    Ok(ApiResponse::ok(alert).with_message(message).into_response())
}

async fn cancel(state: &AppState, req: &ApiRequest) -> ApiResult {
    let alert = state.alerts.cancel(alert_id(req)?).await?;
    Ok(ApiResponse::ok(alert)
        .with_message("SMS alert cancelled")
        .into_response())
}

async fn update(state: &AppState, req: &ApiRequest) -> ApiResult {
    let changes: AlertChanges = req.body()?;
    let alert = state.alerts.update(alert_id(req)?, changes).await?;
    Ok(ApiResponse::ok(alert)
        .with_message("SMS alert updated")
        .into_response())
}

async fn delete(state: &AppState, req: &ApiRequest) -> ApiResult {
    state.alerts.delete(alert_id(req)?).await?;
    Ok(ApiResponse::message("SMS alert deleted").into_response())
}
