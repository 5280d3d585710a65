//! Payment verification workflow
//!
//! Settles fines of returned loans in batches under one method. Bank and
//! QRIS require an uploaded proof before verification; cash is collected at
//! the desk. The batch total is frozen at initiation, every loan in the
//! batch settles together or not at all, and the audit record of a proof
//! submission is written in the same transaction as the state change.

use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::Loan,
        payment::{BatchDetails, InitiatePayment, PaymentVerdict},
    },
    repository::Repository,
    services::{
        loans::LoansService,
        media::MediaStore,
        notify::{tags, NotificationSink, NotifyEvent},
    },
};

#[derive(Clone)]
pub struct PaymentsService {
    repository: Repository,
    loans: LoansService,
    media: Arc<dyn MediaStore>,
    sink: Arc<dyn NotificationSink>,
}

impl PaymentsService {
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

    /// Returned loans of a user whose fine is still open for settlement
    pub async fn settleable_loans(&self, user_id: i32) -> AppResult<Vec<Loan>> {
        self.repository.loans.list_settleable_for_user(user_id).await
    }

    /// Start a settlement batch. Validation is all-or-nothing inside the
    /// repository transaction; nothing is written unless every loan
    /// qualifies.
    pub async fn initiate(&self, user_id: i32, request: InitiatePayment) -> AppResult<BatchDetails> {
        if request.loan_ids.is_empty() {
            return Err(AppError::Validation("At least one loan is required".to_string()));
        }
        let mut deduped = request.loan_ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        if deduped.len() != request.loan_ids.len() {
            return Err(AppError::Validation("Duplicate loan ids in batch".to_string()));
        }

        let batch = self
            .repository
            .payments
            .initiate(user_id, &request.loan_ids, request.method)
            .await?;

        tracing::info!(
            batch_id = %batch.id,
            user_id,
            total = batch.total_amount,
            method = batch.method.as_str(),
            "Payment batch initiated"
        );

        let message = if batch.method.requires_proof() {
            format!(
                "Pembayaran denda Rp{} via {} dibuat. Unggah bukti pembayaran.",
                batch.total_amount, batch.method
            )
        } else {
            format!(
                "Pembayaran denda Rp{} tunai dibuat. Selesaikan di meja perpustakaan.",
                batch.total_amount
            )
        };
        self.sink
            .notify(
                user_id,
                NotifyEvent {
                    title: "Pembayaran Denda Dibuat".to_string(),
                    message,
                    tag: tags::PAYMENT_INITIATED,
                    data: serde_json::json!({"batch_id": batch.id}),
                },
            )
            .await;

        let loan_ids = self.repository.payments.loan_ids(batch.id).await?;
        Ok(BatchDetails::from_batch(batch, loan_ids))
    }

    /// Attach the transfer/QRIS receipt. The durable audit record is part of
    /// the same transaction; push delivery to reviewers happens after commit
    /// and may fail freely.
    pub async fn upload_proof(
        &self,
        batch_id: Uuid,
        acting_user_id: i32,
        filename: &str,
        bytes: &[u8],
    ) -> AppResult<BatchDetails> {
        let current = self.repository.payments.get_by_id(batch_id).await?;
        if current.user_id != acting_user_id {
            return Err(AppError::Authorization(
                "Cannot upload proof for another user's batch".to_string(),
            ));
        }
        if !current.method.requires_proof() {
            return Err(AppError::InvalidTransition(format!(
                "Cash batch {} takes no payment proof",
                batch_id
            )));
        }

        let proof_url = self.media.store(filename, bytes).await?;

        let batch = self
            .repository
            .payments
            .upload_proof(
                batch_id,
                &proof_url,
                acting_user_id,
                "Bukti Pembayaran Diterima",
                &format!(
                    "Bukti pembayaran Rp{} diterima dan menunggu verifikasi.",
                    current.total_amount
                ),
                tags::PAYMENT_PROOF_SUBMITTED,
                serde_json::json!({"batch_id": batch_id, "proof_url": proof_url}),
            )
            .await?;

        tracing::info!(batch_id = %batch_id, "Payment proof uploaded");

        // Audit row is already committed; these pushes are best-effort.
        self.sink
            .push_only(
                acting_user_id,
                NotifyEvent {
                    title: "Bukti Pembayaran Diterima".to_string(),
                    message: "Bukti pembayaran menunggu verifikasi admin.".to_string(),
                    tag: tags::PAYMENT_PROOF_SUBMITTED,
                    data: serde_json::json!({"batch_id": batch_id}),
                },
            )
            .await;
        self.loans
            .notify_admins(NotifyEvent {
                title: "Verifikasi Pembayaran".to_string(),
                message: format!("Pembayaran Rp{} menunggu verifikasi.", batch.total_amount),
                tag: tags::PAYMENT_PROOF_SUBMITTED,
                data: serde_json::json!({"batch_id": batch_id}),
            })
            .await;

        let loan_ids = self.repository.payments.loan_ids(batch.id).await?;
        Ok(BatchDetails::from_batch(batch, loan_ids))
    }

    /// Admin verdict on a batch pending verification.
    pub async fn verify(&self, batch_id: Uuid, verdict: PaymentVerdict) -> AppResult<BatchDetails> {
        let batch = if verdict.approve {
            let batch = self
                .repository
                .payments
                .approve(batch_id, verdict.note.as_deref())
                .await?;

            tracing::info!(batch_id = %batch_id, total = batch.total_amount, "Payment approved");

            self.sink
                .notify(
                    batch.user_id,
                    NotifyEvent {
                        title: "Pembayaran Lunas".to_string(),
                        message: format!(
                            "Pembayaran denda Rp{} terverifikasi. Terima kasih.",
                            batch.total_amount
                        ),
                        tag: tags::PAYMENT_APPROVED,
                        data: serde_json::json!({"batch_id": batch.id}),
                    },
                )
                .await;
            batch
        } else {
            let note = verdict
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    AppError::Validation("A note is required when rejecting a payment".to_string())
                })?;

            let batch = self.repository.payments.reject(batch_id, note).await?;

            tracing::info!(batch_id = %batch_id, "Payment rejected: {}", note);

            let message = if batch.method.requires_proof() {
                format!("Bukti pembayaran ditolak: {}. Silakan unggah ulang.", note)
            } else {
                format!("Pembayaran tunai belum terverifikasi: {}.", note)
            };
            self.sink
                .notify(
                    batch.user_id,
                    NotifyEvent {
                        title: "Pembayaran Ditolak".to_string(),
                        message,
                        tag: tags::PAYMENT_REJECTED,
                        data: serde_json::json!({"batch_id": batch.id, "note": note}),
                    },
                )
                .await;
            batch
        };

        let loan_ids = self.repository.payments.loan_ids(batch.id).await?;
        Ok(BatchDetails::from_batch(batch, loan_ids))
    }

    /// Borrower abandons an unverified batch, freeing its loans for a new
    /// attempt (e.g. switching from bank transfer to cash).
    pub async fn cancel(&self, batch_id: Uuid, acting_user_id: i32) -> AppResult<BatchDetails> {
        // Cancellation detaches the loans, so capture them first
        let loan_ids = self.repository.payments.loan_ids(batch_id).await?;
        let batch = self.repository.payments.cancel(batch_id, acting_user_id).await?;
        tracing::info!(batch_id = %batch_id, "Payment batch cancelled");
        Ok(BatchDetails::from_batch(batch, loan_ids))
    }

    /// One batch with its loans
    pub async fn batch_details(&self, batch_id: Uuid) -> AppResult<BatchDetails> {
        let batch = self.repository.payments.get_by_id(batch_id).await?;
        let loan_ids = self.repository.payments.loan_ids(batch.id).await?;
        Ok(BatchDetails::from_batch(batch, loan_ids))
    }

    /// Batches of one user
    pub async fn user_batches(&self, user_id: i32) -> AppResult<Vec<BatchDetails>> {
        let batches = self.repository.payments.list_for_user(user_id).await?;
        let mut details = Vec::with_capacity(batches.len());
        for batch in batches {
            let loan_ids = self.repository.payments.loan_ids(batch.id).await?;
            details.push(BatchDetails::from_batch(batch, loan_ids));
        }
        Ok(details)
    }

    /// Admin verification queue
    pub async fn pending_batches(&self) -> AppResult<Vec<BatchDetails>> {
        let batches = self.repository.payments.list_pending().await?;
        let mut details = Vec::with_capacity(batches.len());
        for batch in batches {
            let loan_ids = self.repository.payments.loan_ids(batch.id).await?;
            details.push(BatchDetails::from_batch(batch, loan_ids));
        }
        Ok(details)
    }
}
