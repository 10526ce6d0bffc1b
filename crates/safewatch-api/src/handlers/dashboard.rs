//! Dashboard handlers (`/api/dashboard`)

use axum::{extract::State, http::Method, response::IntoResponse};
use chrono::Utc;
use safewatch_common::Error;
use safewatch_storage::models::Notification;
use safewatch_storage::repository::{DashboardRepository, NotificationRepository};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::AppState;
use crate::request::ApiRequest;
use crate::response::{ApiResponse, ApiResult};

/// Default number of recent activity items
pub const DEFAULT_ACTIVITY_LIMIT: i64 = 10;
const MAX_ACTIVITY_LIMIT: i64 = 100;
/// Lookahead window of `upcoming`, in days
pub const UPCOMING_DAYS: i64 = 30;
const NOTIFICATION_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct NotificationFeed {
    pub unread: i64,
    pub notifications: Vec<Notification>,
}

pub async fn handle(State(state): State<Arc<AppState>>, req: ApiRequest) -> ApiResult {
    let dashboard = DashboardRepository::new(state.db_pool.pool().clone());

    match (req.method(), req.action_or("overview")) {
        (&Method::GET, "overview") => Ok(ApiResponse::ok(dashboard.overview().await?).into_response()),
        (&Method::GET, "recent_activity") => {
            let limit = req
                .param("limit")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
                .clamp(1, MAX_ACTIVITY_LIMIT);
            Ok(ApiResponse::ok(dashboard.recent_activity(limit).await?).into_response())
        }
        (&Method::GET, "campaign_performance") => {
            Ok(ApiResponse::ok(dashboard.campaign_performance().await?).into_response())
        }
        (&Method::GET, "upcoming") => {
            let upcoming = dashboard.upcoming(Utc::now(), UPCOMING_DAYS).await?;
            Ok(ApiResponse::ok(upcoming).into_response())
        }
        (&Method::GET, "notifications") => notifications(&state, &req).await,
        (&Method::POST, "mark_notification_read") => mark_read(&state, &req).await,
        _ => Err(req.unknown_action()),
    }
}

async fn notifications(state: &AppState, req: &ApiRequest) -> ApiResult {
    let (auth, _) = state.authenticate_active(req).await?;
    let repo = NotificationRepository::new(state.db_pool.pool().clone());

    Ok(ApiResponse::ok(NotificationFeed {
        unread: repo.unread_count(auth.user_id).await?,
        notifications: repo.list_for_user(auth.user_id, NOTIFICATION_LIMIT).await?,
    })
    .into_response())
}

async fn mark_read(state: &AppState, req: &ApiRequest) -> ApiResult {
    let (auth, _) = state.authenticate_active(req).await?;
    let id = req.require_uuid("notification_id")?;

    let marked = NotificationRepository::new(state.db_pool.pool().clone())
        .mark_read(id, auth.user_id)
        .await?;
    if !marked {
        return Err(Error::not_found("Notification not found").into());
    }
    Ok(ApiResponse::message("Notification marked as read").into_response())
}
