//! Fine payment batches repository
//!
//! Batch state is mirrored onto every constituent loan's
//! `fine_payment_status` inside the same transaction, so the two can never
//! drift. Conditional updates keyed on the current batch status serialize
//! concurrent admin decisions; the loser sees `InvalidTransition`.

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{FinePaymentStatus, LoanStatus, PaymentMethod},
        loan::Loan,
        payment::FinePaymentBatch,
    },
};

#[derive(Clone)]
pub struct PaymentsRepository {
    pool: Pool<Postgres>,
}

impl PaymentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get batch by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<FinePaymentBatch> {
        sqlx::query_as::<_, FinePaymentBatch>("SELECT * FROM fine_payment_batches WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment batch {} not found", id)))
    }

    /// Loan ids settled by a batch, in initiation order
    pub async fn loan_ids(&self, batch_id: Uuid) -> AppResult<Vec<i32>> {
        let ids: Vec<i32> = sqlx::query_scalar(
            "SELECT id FROM loans WHERE payment_batch_id = $1 ORDER BY actual_return_date",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Batches of one user, newest first
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<FinePaymentBatch>> {
        let batches = sqlx::query_as::<_, FinePaymentBatch>(
            "SELECT * FROM fine_payment_batches WHERE user_id = $1 ORDER BY initiated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(batches)
    }

    /// Admin verification queue, oldest first
    pub async fn list_pending(&self) -> AppResult<Vec<FinePaymentBatch>> {
        let batches = sqlx::query_as::<_, FinePaymentBatch>(
            r#"
            SELECT * FROM fine_payment_batches
            WHERE status = 'pending_verification'
            ORDER BY initiated_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(batches)
    }

    /// Create a settlement batch over the given loans. All-or-nothing: every
    /// loan must be a returned, fined, unpaid loan of this user outside any
    /// open batch, or the whole initiation fails and nothing is written.
    /// The batch total is frozen here and never recomputed.
    pub async fn initiate(
        &self,
        user_id: i32,
        loan_ids: &[i32],
        method: PaymentMethod,
    ) -> AppResult<FinePaymentBatch> {
        let mut tx = self.pool.begin().await?;

        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = ANY($1) FOR UPDATE")
            .bind(loan_ids)
            .fetch_all(&mut *tx)
            .await?;

        if loans.len() != loan_ids.len() {
            let found: Vec<i32> = loans.iter().map(|l| l.id).collect();
            let missing: Vec<String> = loan_ids
                .iter()
                .filter(|id| !found.contains(id))
                .map(|id| id.to_string())
                .collect();
            return Err(AppError::NotFound(format!(
                "Loans not found: {}",
                missing.join(", ")
            )));
        }

        for loan in &loans {
            if loan.user_id != user_id {
                return Err(AppError::Authorization(format!(
                    "Loan {} does not belong to user {}",
                    loan.id, user_id
                )));
            }
            if loan.status != LoanStatus::Returned {
                return Err(AppError::InvalidTransition(format!(
                    "Loan {} is {}, only returned loans can be settled",
                    loan.id,
                    loan.status.as_str()
                )));
            }
            if loan.fine_amount <= 0 {
                return Err(AppError::Validation(format!(
                    "Loan {} carries no fine",
                    loan.id
                )));
            }
            if !loan.fine_payment_status.is_settleable() {
                return Err(AppError::InvalidTransition(format!(
                    "Fine of loan {} is {}",
                    loan.id,
                    loan.fine_payment_status.as_str()
                )));
            }
            if loan.payment_batch_id.is_some() {
                return Err(AppError::Conflict(format!(
                    "Loan {} is already part of an open payment batch",
                    loan.id
                )));
            }
        }

        let total: i64 = loans.iter().map(|l| l.fine_amount).sum();
        let status = method.initial_status();

        let batch = sqlx::query_as::<_, FinePaymentBatch>(
            r#"
            INSERT INTO fine_payment_batches
                (id, user_id, total_amount, method, status, initiated_at,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(total)
        .bind(method)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE loans
            SET fine_payment_status = $1,
                fine_payment_method = $2,
                payment_batch_id = $3,
                updated_at = NOW()
            WHERE id = ANY($4)
            "#,
        )
        .bind(status)
        .bind(method)
        .bind(batch.id)
        .bind(loan_ids)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() != loan_ids.len() as u64 {
            return Err(AppError::Conflict(
                "Batch loans changed during initiation".to_string(),
            ));
        }

        tx.commit().await?;
        Ok(batch)
    }

    /// Attach a payment proof: `awaiting_proof -> pending_verification` for
    /// the batch and every constituent loan. The caller-supplied audit
    /// notification is inserted in the same transaction, so the record
    /// survives even if push delivery never happens.
    #[allow(clippy::too_many_arguments)]
    pub async fn upload_proof(
        &self,
        batch_id: Uuid,
        proof_url: &str,
        audit_user_id: i32,
        audit_title: &str,
        audit_message: &str,
        audit_tag: &str,
        audit_data: serde_json::Value,
    ) -> AppResult<FinePaymentBatch> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, FinePaymentBatch>(
            r#"
            UPDATE fine_payment_batches
            SET status = 'pending_verification',
                proof_url = $2,
                proof_uploaded_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'awaiting_proof'
            RETURNING *
            "#,
        )
        .bind(batch_id)
        .bind(proof_url)
        .fetch_optional(&mut *tx)
        .await?;

        let batch = match updated {
            Some(batch) => batch,
            None => return Err(self.batch_transition_error(batch_id, "pending_verification").await),
        };

        sqlx::query(
            r#"
            UPDATE loans
            SET fine_payment_status = 'pending_verification',
                fine_payment_proof = $2,
                updated_at = NOW()
            WHERE payment_batch_id = $1 AND fine_payment_status = 'awaiting_proof'
            "#,
        )
        .bind(batch_id)
        .bind(proof_url)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, title, message, tag, data, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(audit_user_id)
        .bind(audit_title)
        .bind(audit_message)
        .bind(audit_tag)
        .bind(audit_data)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(batch)
    }

    /// Settle the batch: every loan paid, the ledger decremented by the
    /// frozen batch total (floored at zero), atomically.
    pub async fn approve(&self, batch_id: Uuid, note: Option<&str>) -> AppResult<FinePaymentBatch> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, FinePaymentBatch>(
            r#"
            UPDATE fine_payment_batches
            SET status = 'paid',
                admin_note = COALESCE($2, admin_note),
                verified_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending_verification'
            RETURNING *
            "#,
        )
        .bind(batch_id)
        .bind(note)
        .fetch_optional(&mut *tx)
        .await?;

        let batch = match updated {
            Some(batch) => batch,
            None => return Err(self.batch_transition_error(batch_id, "paid").await),
        };

        sqlx::query(
            r#"
            UPDATE loans
            SET fine_payment_status = 'paid',
                fine_payment_at = $2,
                updated_at = NOW()
            WHERE payment_batch_id = $1
            "#,
        )
        .bind(batch_id)
        .bind(batch.verified_at.unwrap_or_else(Utc::now))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users
            SET unpaid_fines = GREATEST(0, unpaid_fines - $2), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(batch.user_id)
        .bind(batch.total_amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(batch)
    }

    /// Refuse the pending proof. Proof-based methods drop back to
    /// `awaiting_proof` so the user can resubmit; cash stays in
    /// `pending_verification` carrying the note, pending re-collection.
    pub async fn reject(&self, batch_id: Uuid, note: &str) -> AppResult<FinePaymentBatch> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, FinePaymentBatch>(
            "SELECT * FROM fine_payment_batches WHERE id = $1 FOR UPDATE",
        )
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment batch {} not found", batch_id)))?;

        if current.status != FinePaymentStatus::PendingVerification {
            return Err(AppError::InvalidTransition(format!(
                "Payment batch {} is {}, nothing to verify",
                batch_id,
                current.status.as_str()
            )));
        }

        let next = if current.method.requires_proof() {
            FinePaymentStatus::AwaitingProof
        } else {
            FinePaymentStatus::PendingVerification
        };

        let batch = sqlx::query_as::<_, FinePaymentBatch>(
            r#"
            UPDATE fine_payment_batches
            SET status = $2, admin_note = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(batch_id)
        .bind(next)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE loans
            SET fine_payment_status = $2, updated_at = NOW()
            WHERE payment_batch_id = $1
            "#,
        )
        .bind(batch_id)
        .bind(next)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(batch)
    }

    /// User abandons an unverified batch, releasing its loans for a fresh
    /// initiation (e.g. with a different method).
    pub async fn cancel(&self, batch_id: Uuid, user_id: i32) -> AppResult<FinePaymentBatch> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, FinePaymentBatch>(
            r#"
            UPDATE fine_payment_batches
            SET status = 'rejected', updated_at = NOW()
            WHERE id = $1 AND user_id = $2
              AND status IN ('awaiting_proof', 'pending_verification')
            RETURNING *
            "#,
        )
        .bind(batch_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let batch = match updated {
            Some(batch) => batch,
            None => return Err(self.batch_transition_error(batch_id, "rejected").await),
        };

        sqlx::query(
            r#"
            UPDATE loans
            SET fine_payment_status = 'rejected',
                payment_batch_id = NULL,
                updated_at = NOW()
            WHERE payment_batch_id = $1
            "#,
        )
        .bind(batch_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(batch)
    }

    async fn batch_transition_error(&self, batch_id: Uuid, to: &str) -> AppError {
        match self.get_by_id(batch_id).await {
            Ok(batch) => AppError::InvalidTransition(format!(
                "Payment batch {} is {}, cannot move to {}",
                batch_id,
                batch.status.as_str(),
                to
            )),
            Err(e) => e,
        }
    }
}
