//! Loan (borrow transaction) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::enums::{FinePaymentStatus, LoanStatus, PaymentMethod};

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i32,
    /// Human-readable borrow code shown on the pickup slip
    pub borrow_code: String,
    pub user_id: i32,
    pub book_id: i32,
    pub request_date: DateTime<Utc>,
    /// User-chosen due date
    pub expected_return_date: DateTime<Utc>,
    /// Set exactly when the loan reaches `Returned`
    pub actual_return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    /// Settled penalty, frozen when the return is approved
    pub fine_amount: i64,
    /// Manual penalties layered at return-rejection time, folded into
    /// `fine_amount` once the return is finally approved
    pub pending_fine: i64,
    pub fine_payment_status: FinePaymentStatus,
    pub fine_payment_method: Option<PaymentMethod>,
    pub fine_payment_proof: Option<String>,
    pub fine_payment_at: Option<DateTime<Utc>>,
    /// Audit note for manual fines and return-rejection penalties
    pub fine_note: Option<String>,
    /// Open settlement batch this loan's fine belongs to, if any
    pub payment_batch_id: Option<Uuid>,
    // Return evidence (photo + capture metadata), present once the borrower
    // files a physical return
    pub return_proof_url: Option<String>,
    pub return_proof_latitude: Option<f64>,
    pub return_proof_longitude: Option<f64>,
    pub return_proof_accuracy_m: Option<f64>,
    pub return_proof_captured_at: Option<DateTime<Utc>>,
    pub return_proof_address: Option<String>,
    /// Counter-evidence attached by an admin when rejecting a return
    pub admin_proof_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Whether the due date has passed, by calendar day. A loan returned any
    /// time on its due date is on time.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() > self.expected_return_date.date_naive()
    }

    /// Read-time status: out loans past due display as `Overdue`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> LoanStatus {
        self.status.classify(self.is_past_due(now))
    }
}

/// Capture metadata accompanying a return-proof photo
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReturnProofMeta {
    pub latitude: f64,
    pub longitude: f64,
    /// GPS accuracy in meters
    pub accuracy_m: Option<f64>,
    pub captured_at: DateTime<Utc>,
    /// Reverse-geocoded address, resolved client-side
    pub address: Option<String>,
}

/// Loan with book/user context for display
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub borrow_code: String,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub book_id: i32,
    pub book_title: Option<String>,
    pub request_date: DateTime<Utc>,
    pub expected_return_date: DateTime<Utc>,
    pub actual_return_date: Option<DateTime<Utc>>,
    /// Effective status (overdue classification applied)
    pub status: LoanStatus,
    /// Presentation label for the effective status
    pub status_label: String,
    /// Settled fine for returned loans, running accrual otherwise
    pub fine_amount: i64,
    pub pending_fine: i64,
    pub fine_payment_status: FinePaymentStatus,
    pub fine_payment_method: Option<PaymentMethod>,
    pub fine_payment_proof: Option<String>,
    pub fine_payment_at: Option<DateTime<Utc>>,
    pub fine_note: Option<String>,
    pub payment_batch_id: Option<Uuid>,
    pub return_proof_url: Option<String>,
    pub return_proof_latitude: Option<f64>,
    pub return_proof_longitude: Option<f64>,
    pub return_proof_accuracy_m: Option<f64>,
    pub return_proof_captured_at: Option<DateTime<Utc>>,
    pub return_proof_address: Option<String>,
    pub admin_proof_url: Option<String>,
}

/// Create loan request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    pub book_id: i32,
    /// Expected return date chosen by the borrower
    pub expected_return_date: DateTime<Utc>,
}

/// Admin decision on a pending loan request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoanDecision {
    pub approve: bool,
    /// Shown to the borrower when the request is rejected
    pub note: Option<String>,
}

/// Admin verdict on submitted return evidence
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReturnReview {
    pub approve: bool,
    /// Manual penalty layered on top of the accrued late fee (approve) or
    /// attached to the rejection (reject)
    #[validate(range(min = 0, message = "Fine amount cannot be negative"))]
    pub fine_amount: Option<i64>,
    /// Mandatory when rejecting, or when a manual fine is applied
    pub reason: Option<String>,
}

/// Per-user fine summary: live accrual over out loans plus settled-but-unpaid
/// fines (see `services::fines`)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FineSummary {
    pub user_id: i32,
    /// Settled, unpaid fines (the ledger's `unpaid_fines`)
    pub unpaid_fines: i64,
    /// Live recomputation over loans still out past their due date
    pub running_fines: i64,
    /// `unpaid_fines + running_fines`
    pub total_due: i64,
    pub lifetime_fines: i64,
}
