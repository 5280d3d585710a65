//! Shared domain enums
//!
//! Statuses are closed enumerations stored as their `as_str` form. The
//! Indonesian labels shown to borrowers live only in the `Display` impls;
//! nothing matches on them.

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

/// Stored loan status. `Overdue` is never written to the database: it is the
/// read-time classification of an active loan past its expected return date
/// (see [`LoanStatus::classify`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Requested,
    Approved,
    Taken,
    Borrowing,
    ReadyForReturn,
    Overdue,
    Returned,
    Rejected,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "requested",
            LoanStatus::Approved => "approved",
            LoanStatus::Taken => "taken",
            LoanStatus::Borrowing => "borrowing",
            LoanStatus::ReadyForReturn => "ready_for_return",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
            LoanStatus::Rejected => "rejected",
        }
    }

    /// Terminal statuses close the loan; the fine ledger may still be open.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Returned | LoanStatus::Rejected)
    }

    /// Statuses counted into the user's `active_loans` ledger field.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Statuses where the book is physically with the borrower and late
    /// return accrues fines.
    pub fn is_out(&self) -> bool {
        matches!(
            self,
            LoanStatus::Taken | LoanStatus::Borrowing | LoanStatus::ReadyForReturn
        )
    }

    /// Read-time classification: an out loan past its due date displays as
    /// `Overdue` without a stored transition.
    pub fn classify(self, past_due: bool) -> LoanStatus {
        if past_due && matches!(self, LoanStatus::Taken | LoanStatus::Borrowing) {
            LoanStatus::Overdue
        } else {
            self
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LoanStatus::Requested => "Menunggu Persetujuan",
            LoanStatus::Approved => "Disetujui",
            LoanStatus::Taken => "Sudah Diambil",
            LoanStatus::Borrowing => "Sedang Dipinjam",
            LoanStatus::ReadyForReturn => "Menunggu Verifikasi Pengembalian",
            LoanStatus::Overdue => "Terlambat",
            LoanStatus::Returned => "Dikembalikan",
            LoanStatus::Rejected => "Ditolak",
        };
        write!(f, "{}", label)
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(LoanStatus::Requested),
            "approved" => Ok(LoanStatus::Approved),
            "taken" => Ok(LoanStatus::Taken),
            "borrowing" => Ok(LoanStatus::Borrowing),
            "ready_for_return" => Ok(LoanStatus::ReadyForReturn),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            "rejected" => Ok(LoanStatus::Rejected),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

// ---------------------------------------------------------------------------
// FinePaymentStatus
// ---------------------------------------------------------------------------

/// Settlement status of a loan's fine, mirrored onto the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FinePaymentStatus {
    None,
    AwaitingProof,
    PendingVerification,
    Paid,
    Rejected,
}

impl FinePaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinePaymentStatus::None => "none",
            FinePaymentStatus::AwaitingProof => "awaiting_proof",
            FinePaymentStatus::PendingVerification => "pending_verification",
            FinePaymentStatus::Paid => "paid",
            FinePaymentStatus::Rejected => "rejected",
        }
    }

    /// A loan whose fine sits in one of these states may be pulled into a
    /// new settlement batch.
    pub fn is_settleable(&self) -> bool {
        matches!(self, FinePaymentStatus::None | FinePaymentStatus::Rejected)
    }
}

impl std::fmt::Display for FinePaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FinePaymentStatus::None => "Belum Dibayar",
            FinePaymentStatus::AwaitingProof => "Menunggu Bukti Pembayaran",
            FinePaymentStatus::PendingVerification => "Menunggu Verifikasi",
            FinePaymentStatus::Paid => "Lunas",
            FinePaymentStatus::Rejected => "Ditolak",
        };
        write!(f, "{}", label)
    }
}

impl std::str::FromStr for FinePaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(FinePaymentStatus::None),
            "awaiting_proof" => Ok(FinePaymentStatus::AwaitingProof),
            "pending_verification" => Ok(FinePaymentStatus::PendingVerification),
            "paid" => Ok(FinePaymentStatus::Paid),
            "rejected" => Ok(FinePaymentStatus::Rejected),
            _ => Err(format!("Invalid fine payment status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for FinePaymentStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for FinePaymentStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for FinePaymentStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

// ---------------------------------------------------------------------------
// PaymentMethod
// ---------------------------------------------------------------------------

/// How a fine batch is settled. Bank transfer and QRIS require a proof
/// upload before admin verification; cash is collected at the desk and the
/// admin records the evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Bank,
    Qris,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Bank => "bank",
            PaymentMethod::Qris => "qris",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn requires_proof(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }

    /// Status a freshly initiated batch starts in.
    pub fn initial_status(&self) -> FinePaymentStatus {
        if self.requires_proof() {
            FinePaymentStatus::AwaitingProof
        } else {
            FinePaymentStatus::PendingVerification
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PaymentMethod::Bank => "Transfer Bank",
            PaymentMethod::Qris => "QRIS",
            PaymentMethod::Cash => "Tunai",
        };
        write!(f, "{}", label)
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank" => Ok(PaymentMethod::Bank),
            "qris" => Ok(PaymentMethod::Qris),
            "cash" => Ok(PaymentMethod::Cash),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for PaymentMethod {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for PaymentMethod {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for PaymentMethod {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

// ---------------------------------------------------------------------------
// UserRole
// ---------------------------------------------------------------------------

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Member,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Member => "member",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "member" => Ok(UserRole::Member),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for UserRole {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for UserRole {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for UserRole {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loan_status_round_trips_through_str() {
        for status in [
            LoanStatus::Requested,
            LoanStatus::Approved,
            LoanStatus::Taken,
            LoanStatus::Borrowing,
            LoanStatus::ReadyForReturn,
            LoanStatus::Overdue,
            LoanStatus::Returned,
            LoanStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<LoanStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_string_is_an_error_not_a_silent_skip() {
        assert!("dipinjam".parse::<LoanStatus>().is_err());
        assert!("".parse::<FinePaymentStatus>().is_err());
    }

    #[test]
    fn overdue_is_a_classification_of_out_loans_only() {
        assert_eq!(LoanStatus::Borrowing.classify(true), LoanStatus::Overdue);
        assert_eq!(LoanStatus::Taken.classify(true), LoanStatus::Overdue);
        assert_eq!(LoanStatus::Borrowing.classify(false), LoanStatus::Borrowing);
        // ReadyForReturn keeps its own label even when late
        assert_eq!(
            LoanStatus::ReadyForReturn.classify(true),
            LoanStatus::ReadyForReturn
        );
        assert_eq!(LoanStatus::Returned.classify(true), LoanStatus::Returned);
    }

    #[test]
    fn terminal_statuses_are_not_active() {
        assert!(LoanStatus::Returned.is_terminal());
        assert!(LoanStatus::Rejected.is_terminal());
        assert!(!LoanStatus::Returned.is_active());
        assert!(LoanStatus::ReadyForReturn.is_active());
    }

    #[test]
    fn cash_skips_the_proof_stage() {
        assert_eq!(
            PaymentMethod::Cash.initial_status(),
            FinePaymentStatus::PendingVerification
        );
        assert_eq!(
            PaymentMethod::Bank.initial_status(),
            FinePaymentStatus::AwaitingProof
        );
        assert_eq!(
            PaymentMethod::Qris.initial_status(),
            FinePaymentStatus::AwaitingProof
        );
    }

    #[test]
    fn settleable_statuses() {
        assert!(FinePaymentStatus::None.is_settleable());
        assert!(FinePaymentStatus::Rejected.is_settleable());
        assert!(!FinePaymentStatus::Paid.is_settleable());
        assert!(!FinePaymentStatus::AwaitingProof.is_settleable());
        assert!(!FinePaymentStatus::PendingVerification.is_settleable());
    }
}
