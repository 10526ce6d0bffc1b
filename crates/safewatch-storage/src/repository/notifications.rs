//! Notification repository

use safewatch_common::types::{NotificationId, UserId};
use safewatch_common::Result;
use sqlx::PgPool;

use crate::db::db_failure;
use crate::models::Notification;

/// Notification repository
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A user's notifications, unread first then newest first
    pub async fn list_for_user(&self, user_id: UserId, limit: i64) -> Result<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1
            ORDER BY is_read ASC, created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list notifications"))
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to count notifications"))?;
        Ok(row.0)
    }

    /// Mark a notification read; `false` unless it exists and belongs to the user
    pub async fn mark_read(&self, id: NotificationId, user_id: UserId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(db_failure("Failed to update notification"))?;
        Ok(result.rows_affected() > 0)
    }
}
