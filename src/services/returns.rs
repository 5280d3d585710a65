//! Return proof review service
//!
//! Borrowers file photographic evidence (with capture GPS metadata) that a
//! book is back. Admins either approve the return, closing the loan and
//! freezing the fine, or reject it with a mandatory reason, optionally
//! attaching counter-evidence and a penalty. Review actions ride on
//! conditional updates, so concurrent verdicts on one loan resolve to a
//! single winner.

use chrono::Utc;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, ReturnProofMeta, ReturnReview},
    repository::Repository,
    services::{
        fines,
        loans::LoansService,
        media::MediaStore,
        notify::{tags, NotificationSink, NotifyEvent},
    },
};

#[derive(Clone)]
pub struct ReturnsService {
    repository: Repository,
    loans: LoansService,
    media: Arc<dyn MediaStore>,
    sink: Arc<dyn NotificationSink>,
}

impl ReturnsService {
    pub fn new(
        repository: Repository,
        loans: LoansService,
        media: Arc<dyn MediaStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            repository,
            loans,
            media,
            sink,
        }
    }

    /// Borrower submits return evidence: the loan moves to `ReadyForReturn`
    /// and lands in the admin review queue.
    pub async fn submit(
        &self,
        loan_id: i32,
        acting_user_id: i32,
        filename: &str,
        photo: &[u8],
        meta: Option<ReturnProofMeta>,
    ) -> AppResult<Loan> {
        let current = self.repository.loans.get_by_id(loan_id).await?;
        if current.user_id != acting_user_id {
            return Err(AppError::Authorization(
                "Cannot submit a return for another user's loan".to_string(),
            ));
        }

        let proof_url = self.media.store(filename, photo).await?;
        let loan = self
            .repository
            .loans
            .submit_return(loan_id, &proof_url, meta.as_ref())
            .await?;

        tracing::info!(loan_id, "Return proof submitted");

        self.loans
            .notify_admins(NotifyEvent {
                title: "Pengembalian Menunggu Verifikasi".to_string(),
                message: format!("Bukti pengembalian {} menunggu verifikasi.", loan.borrow_code),
                tag: tags::RETURN_SUBMITTED,
                data: serde_json::json!({"loan_id": loan.id}),
            })
            .await;

        Ok(loan)
    }

    /// Admin verdict on submitted evidence.
    pub async fn review(
        &self,
        loan_id: i32,
        review: ReturnReview,
        admin_proof: Option<(&str, &[u8])>,
    ) -> AppResult<Loan> {
        if review.approve {
            self.approve(loan_id, review).await
        } else {
            self.reject(loan_id, review, admin_proof).await
        }
    }

    /// Close the loan. The fine is the accrued late fee at this moment plus
    /// any manual penalty plus pending rejection penalties; review latency
    /// counts against the borrower (intentionally preserved behavior).
    async fn approve(&self, loan_id: i32, review: ReturnReview) -> AppResult<Loan> {
        let manual_fine = review.fine_amount.unwrap_or(0);
        if manual_fine < 0 {
            return Err(AppError::Validation("Fine amount cannot be negative".to_string()));
        }
        if manual_fine > 0 && review.reason.as_deref().map_or(true, |r| r.trim().is_empty()) {
            return Err(AppError::Validation(
                "A reason is required when applying a manual fine".to_string(),
            ));
        }

        let current = self.repository.loans.get_by_id(loan_id).await?;
        let now = Utc::now();
        let accrued = fines::penalty(
            current.expected_return_date,
            now,
            self.loans.penalty_per_day(),
        );
        let total = accrued + manual_fine + current.pending_fine;

        let loan = self
            .repository
            .loans
            .approve_return(loan_id, total, review.reason.as_deref(), now)
            .await?;

        tracing::info!(loan_id, fine = total, "Return approved");

        let message = if total > 0 {
            format!(
                "Pengembalian {} diterima. Denda keterlambatan: Rp{}.",
                loan.borrow_code, total
            )
        } else {
            format!("Pengembalian {} diterima. Tidak ada denda.", loan.borrow_code)
        };
        self.sink
            .notify(
                loan.user_id,
                NotifyEvent {
                    title: "Pengembalian Diterima".to_string(),
                    message,
                    tag: tags::RETURN_APPROVED,
                    data: serde_json::json!({"loan_id": loan.id, "fine_amount": total}),
                },
            )
            .await;

        Ok(loan)
    }

    /// Keep the loan active. The reason is mandatory; an optional penalty
    /// accrues as a pending fine and any counter-proof photo is stored for
    /// dispute resolution.
    async fn reject(
        &self,
        loan_id: i32,
        review: ReturnReview,
        admin_proof: Option<(&str, &[u8])>,
    ) -> AppResult<Loan> {
        let reason = review
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                AppError::Validation("A reason is required when rejecting a return".to_string())
            })?;
        let fine = review.fine_amount.unwrap_or(0);
        if fine < 0 {
            return Err(AppError::Validation("Fine amount cannot be negative".to_string()));
        }

        let admin_proof_url = match admin_proof {
            Some((filename, bytes)) => Some(self.media.store(filename, bytes).await?),
            None => None,
        };

        let loan = self
            .repository
            .loans
            .reject_return(loan_id, reason, fine, admin_proof_url.as_deref())
            .await?;

        tracing::info!(loan_id, fine, "Return rejected: {}", reason);

        let mut message = format!("Pengembalian {} ditolak: {}", loan.borrow_code, reason);
        if fine > 0 {
            message.push_str(&format!(" Denda tambahan Rp{}.", fine));
        }
        self.sink
            .notify(
                loan.user_id,
                NotifyEvent {
                    title: "Pengembalian Ditolak".to_string(),
                    message,
                    tag: tags::RETURN_REJECTED,
                    data: serde_json::json!({"loan_id": loan.id, "reason": reason, "fine": fine}),
                },
            )
            .await;

        Ok(loan)
    }
}
