//! Notification audit record and push subscription models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Durable notification record. Inserted transactionally with the state
/// change it describes; push delivery happens afterwards and may fail
/// without touching this row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub message: String,
    /// Machine-readable event tag (`loan_approved`, `payment_rejected`, ...)
    pub tag: String,
    /// Structured payload for the client (loan id, batch id, ...)
    pub data: Option<serde_json::Value>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Push subscription: user/device → gateway token. Persisted so restarts
/// don't drop delivery targets.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PushSubscription {
    pub id: i32,
    pub user_id: i32,
    pub device_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Register device token request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterSubscription {
    #[validate(length(min = 1, message = "Device token is required"))]
    pub device_token: String,
}
