//! Fine payment batch model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::enums::{FinePaymentStatus, PaymentMethod};

/// Fine payment batch from database: one settlement attempt grouping one or
/// more loan fines under a single method. Status is applied atomically
/// across every constituent loan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FinePaymentBatch {
    pub id: Uuid,
    pub user_id: i32,
    /// Sum of constituent `fine_amount`, frozen at initiation
    pub total_amount: i64,
    pub method: PaymentMethod,
    pub status: FinePaymentStatus,
    pub proof_url: Option<String>,
    /// Admin note recorded at verification (rejection reason, cash receipt
    /// reference)
    pub admin_note: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub proof_uploaded_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Batch with its loan ids for display
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchDetails {
    pub id: Uuid,
    pub user_id: i32,
    pub loan_ids: Vec<i32>,
    pub total_amount: i64,
    pub method: PaymentMethod,
    pub status: FinePaymentStatus,
    pub status_label: String,
    pub proof_url: Option<String>,
    pub admin_note: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub proof_uploaded_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl BatchDetails {
    pub fn from_batch(batch: FinePaymentBatch, loan_ids: Vec<i32>) -> Self {
        Self {
            id: batch.id,
            user_id: batch.user_id,
            loan_ids,
            total_amount: batch.total_amount,
            method: batch.method,
            status: batch.status,
            status_label: batch.status.to_string(),
            proof_url: batch.proof_url,
            admin_note: batch.admin_note,
            initiated_at: batch.initiated_at,
            proof_uploaded_at: batch.proof_uploaded_at,
            verified_at: batch.verified_at,
        }
    }
}

/// Initiate payment request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InitiatePayment {
    #[validate(length(min = 1, message = "At least one loan is required"))]
    pub loan_ids: Vec<i32>,
    pub method: PaymentMethod,
}

/// Admin verdict on a pending batch
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentVerdict {
    pub approve: bool,
    /// Mandatory when rejecting
    pub note: Option<String>,
}
