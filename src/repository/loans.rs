//! Loans repository for database operations
//!
//! Every status change goes through a conditional update keyed on the
//! current status (`UPDATE ... WHERE id = $1 AND status = $expected`).
//! A zero-row result means another writer got there first, or the caller's
//! view was stale; either way the caller gets `InvalidTransition` carrying
//! the actual current status. Ledger fields on the user row are mutated in
//! the same transaction as the loan state change that causes them.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::LoanStatus,
        loan::{Loan, ReturnProofMeta},
    },
};

/// Loan row joined with display context
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoanJoinRow {
    #[sqlx(flatten)]
    pub loan: Loan,
    pub book_title: Option<String>,
    pub user_name: Option<String>,
}

const LOAN_JOIN_SELECT: &str = r#"
    SELECT l.*, b.title AS book_title, u.name AS user_name
    FROM loans l
    LEFT JOIN books b ON l.book_id = b.id
    LEFT JOIN users u ON l.user_id = u.id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Get loan with book/user context
    pub async fn get_join_by_id(&self, id: i32) -> AppResult<LoanJoinRow> {
        sqlx::query_as::<_, LoanJoinRow>(&format!("{} WHERE l.id = $1", LOAN_JOIN_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// All loans of a user, newest first
    pub async fn list_user_loans(&self, user_id: i32) -> AppResult<Vec<LoanJoinRow>> {
        let rows = sqlx::query_as::<_, LoanJoinRow>(&format!(
            "{} WHERE l.user_id = $1 ORDER BY l.request_date DESC",
            LOAN_JOIN_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Admin queue: loans in a given stored status, oldest first
    pub async fn list_by_status(&self, status: LoanStatus) -> AppResult<Vec<LoanJoinRow>> {
        let rows = sqlx::query_as::<_, LoanJoinRow>(&format!(
            "{} WHERE l.status = $1 ORDER BY l.request_date",
            LOAN_JOIN_SELECT
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Loans currently out with the borrower (fines may be accruing)
    pub async fn list_out_for_user(&self, user_id: i32) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE user_id = $1 AND status IN ('taken', 'borrowing', 'ready_for_return')
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Settled loans of a user with an unpaid fine eligible for a new batch
    pub async fn list_settleable_for_user(&self, user_id: i32) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE user_id = $1 AND status = 'returned' AND fine_amount > 0
              AND fine_payment_status IN ('none', 'rejected')
              AND payment_batch_id IS NULL
            ORDER BY actual_return_date
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Out loans due within the reminder window or already past due.
    /// Read-only; the sweep never writes loan state.
    pub async fn list_due_for_reminder(
        &self,
        due_before: DateTime<Utc>,
    ) -> AppResult<Vec<LoanJoinRow>> {
        let rows = sqlx::query_as::<_, LoanJoinRow>(&format!(
            r#"{} WHERE l.status IN ('taken', 'borrowing')
                 AND l.expected_return_date <= $1
               ORDER BY l.expected_return_date"#,
            LOAN_JOIN_SELECT
        ))
        .bind(due_before)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Whether the user already holds an active (non-terminal) loan of this book
    pub async fn has_active_loan(&self, user_id: i32, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans
                WHERE user_id = $1 AND book_id = $2
                  AND status NOT IN ('returned', 'rejected')
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a loan request. Checks stock and the one-active-loan-per-book
    /// guard inside the transaction that also bumps the borrower's
    /// active-loan counter.
    pub async fn create(
        &self,
        user_id: i32,
        book_id: i32,
        expected_return_date: DateTime<Utc>,
        borrow_code: &str,
    ) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        // Duplicate-loan guard first, so a user holding the last copy gets
        // AlreadyBorrowed rather than OutOfStock
        let already: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans
                WHERE user_id = $1 AND book_id = $2
                  AND status NOT IN ('returned', 'rejected')
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;
        if already {
            return Err(AppError::AlreadyBorrowed(format!(
                "User {} already has an active loan of book {}",
                user_id, book_id
            )));
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT available_stock FROM books WHERE id = $1 FOR UPDATE")
                .bind(book_id)
                .fetch_optional(&mut *tx)
                .await?;
        let available =
            available.ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
        if available <= 0 {
            return Err(AppError::OutOfStock(format!(
                "No copies of book {} available",
                book_id
            )));
        }

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (borrow_code, user_id, book_id, request_date,
                               expected_return_date, status,
                               fine_amount, pending_fine, fine_payment_status,
                               created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), $4, 'requested', 0, 0, 'none', NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(borrow_code)
        .bind(user_id)
        .bind(book_id)
        .bind(expected_return_date)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET active_loans = active_loans + 1, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(loan)
    }

    /// Plain guarded transition with no side effects (pickup, borrow
    /// acknowledgement). The conditional update is the mutual exclusion:
    /// of two racing writers exactly one matches a row.
    pub async fn transition(
        &self,
        loan_id: i32,
        from: &[LoanStatus],
        to: LoanStatus,
    ) -> AppResult<Loan> {
        let from_strs: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = ANY($3)
            RETURNING *
            "#,
        )
        .bind(to)
        .bind(loan_id)
        .bind(&from_strs)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(loan) => Ok(loan),
            None => Err(self.transition_error(loan_id, to).await),
        }
    }

    /// Approve a pending request: `Requested -> Approved`, reserving one copy.
    pub async fn approve_request(&self, loan_id: i32) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET status = 'approved', updated_at = NOW()
            WHERE id = $1 AND status = 'requested'
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?;

        let loan = match updated {
            Some(loan) => loan,
            None => return Err(self.transition_error(loan_id, LoanStatus::Approved).await),
        };

        let result = sqlx::query(
            r#"
            UPDATE books SET available_stock = available_stock - 1, updated_at = NOW()
            WHERE id = $1 AND available_stock > 0
            "#,
        )
        .bind(loan.book_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            // Stock ran out between request and approval; abort the approval
            return Err(AppError::OutOfStock(format!(
                "No copies of book {} available",
                loan.book_id
            )));
        }

        tx.commit().await?;
        Ok(loan)
    }

    /// Reject a pending request: `Requested -> Rejected` (terminal).
    pub async fn reject_request(&self, loan_id: i32, note: Option<&str>) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET status = 'rejected', fine_note = COALESCE($2, fine_note),
                             updated_at = NOW()
            WHERE id = $1 AND status = 'requested'
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(note)
        .fetch_optional(&mut *tx)
        .await?;

        let loan = match updated {
            Some(loan) => loan,
            None => return Err(self.transition_error(loan_id, LoanStatus::Rejected).await),
        };

        sqlx::query(
            "UPDATE users SET active_loans = GREATEST(0, active_loans - 1), updated_at = NOW() WHERE id = $1",
        )
        .bind(loan.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(loan)
    }

    /// Borrower files return evidence: out loan -> `ReadyForReturn` with the
    /// proof photo and capture metadata attached.
    pub async fn submit_return(
        &self,
        loan_id: i32,
        proof_url: &str,
        meta: Option<&ReturnProofMeta>,
    ) -> AppResult<Loan> {
        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = 'ready_for_return',
                return_proof_url = $2,
                return_proof_latitude = $3,
                return_proof_longitude = $4,
                return_proof_accuracy_m = $5,
                return_proof_captured_at = $6,
                return_proof_address = $7,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('taken', 'borrowing')
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(proof_url)
        .bind(meta.map(|m| m.latitude))
        .bind(meta.map(|m| m.longitude))
        .bind(meta.and_then(|m| m.accuracy_m))
        .bind(meta.map(|m| m.captured_at))
        .bind(meta.and_then(|m| m.address.as_deref()))
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(loan) => Ok(loan),
            None => Err(self.transition_error(loan_id, LoanStatus::ReadyForReturn).await),
        }
    }

    /// Close the loan: `ReadyForReturn -> Returned`. Stamps the actual return
    /// date, freezes the fine, restores the copy to the shelf and settles the
    /// borrower's ledger, all in one transaction.
    pub async fn approve_return(
        &self,
        loan_id: i32,
        total_fine: i64,
        fine_note: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = 'returned',
                actual_return_date = $2,
                fine_amount = $3,
                pending_fine = 0,
                fine_note = COALESCE($4, fine_note),
                updated_at = NOW()
            WHERE id = $1 AND status = 'ready_for_return'
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(now)
        .bind(total_fine)
        .bind(fine_note)
        .fetch_optional(&mut *tx)
        .await?;

        let loan = match updated {
            Some(loan) => loan,
            None => return Err(self.transition_error(loan_id, LoanStatus::Returned).await),
        };

        sqlx::query(
            r#"
            UPDATE books
            SET available_stock = LEAST(total_stock, available_stock + 1), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(loan.book_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users
            SET active_loans = GREATEST(0, active_loans - 1),
                unpaid_fines = unpaid_fines + $2,
                lifetime_fines = lifetime_fines + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(loan.user_id)
        .bind(total_fine)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(loan)
    }

    /// Reject submitted return evidence: `ReadyForReturn -> Borrowing`.
    /// Any penalty attached to the rejection accrues as a pending fine folded
    /// in at final approval; the admin counter-proof is kept for disputes.
    pub async fn reject_return(
        &self,
        loan_id: i32,
        reason: &str,
        fine: i64,
        admin_proof_url: Option<&str>,
    ) -> AppResult<Loan> {
        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = 'borrowing',
                pending_fine = pending_fine + $2,
                fine_note = $3,
                admin_proof_url = COALESCE($4, admin_proof_url),
                updated_at = NOW()
            WHERE id = $1 AND status = 'ready_for_return'
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(fine)
        .bind(reason)
        .bind(admin_proof_url)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(loan) => Ok(loan),
            None => Err(self.transition_error(loan_id, LoanStatus::Borrowing).await),
        }
    }

    /// Build the error for a failed conditional update, distinguishing a
    /// missing loan from a stale/raced status.
    async fn transition_error(&self, loan_id: i32, to: LoanStatus) -> AppError {
        match self.get_by_id(loan_id).await {
            Ok(loan) => AppError::InvalidTransition(format!(
                "Loan {} is {}, cannot move to {}",
                loan_id,
                loan.status.as_str(),
                to.as_str()
            )),
            Err(e) => e,
        }
    }
}
