//! Notifications and push subscriptions repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::notification::{Notification, PushSubscription},
};

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: Pool<Postgres>,
}

impl NotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a durable notification record
    pub async fn insert(
        &self,
        user_id: i32,
        title: &str,
        message: &str,
        tag: &str,
        data: Option<serde_json::Value>,
    ) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, title, message, tag, data, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(message)
        .bind(tag)
        .bind(data)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    /// Notifications of one user, newest first
    pub async fn list_for_user(&self, user_id: i32, limit: i64) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit.clamp(1, 200))
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Mark a notification as read
    pub async fn mark_read(&self, id: i32, user_id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = NOW() WHERE id = $1 AND user_id = $2 AND read_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Unread notification {} not found for user {}",
                id, user_id
            )));
        }
        Ok(())
    }

    /// Register or refresh a device token for a user. Keyed on the token so
    /// a device changing hands moves to the new user.
    pub async fn upsert_subscription(
        &self,
        user_id: i32,
        device_token: &str,
    ) -> AppResult<PushSubscription> {
        let subscription = sqlx::query_as::<_, PushSubscription>(
            r#"
            INSERT INTO push_subscriptions (user_id, device_token, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            ON CONFLICT (device_token)
            DO UPDATE SET user_id = EXCLUDED.user_id, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(device_token)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscription)
    }

    /// Device tokens registered for a user
    pub async fn tokens_for_user(&self, user_id: i32) -> AppResult<Vec<String>> {
        let tokens: Vec<String> =
            sqlx::query_scalar("SELECT device_token FROM push_subscriptions WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(tokens)
    }

    /// Drop a device token (logout, token rotation)
    pub async fn remove_subscription(&self, user_id: i32, device_token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM push_subscriptions WHERE user_id = $1 AND device_token = $2")
            .bind(user_id)
            .bind(device_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
