//! Loan lifecycle service
//!
//! Owns every loan state transition from request to closure. Guards live in
//! the repository's conditional updates; this layer sequences them, applies
//! policy (loan duration cap), computes fines at settlement points and fans
//! out notifications after the state change has committed.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;

use crate::{
    config::LoanConfig,
    error::{AppError, AppResult},
    models::{
        enums::LoanStatus,
        loan::{CreateLoan, FineSummary, Loan, LoanDetails},
    },
    repository::{loans::LoanJoinRow, Repository},
    services::{
        fines,
        notify::{tags, NotificationSink, NotifyEvent},
    },
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    config: LoanConfig,
    sink: Arc<dyn NotificationSink>,
}

impl LoansService {
    pub fn new(repository: Repository, config: LoanConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            repository,
            config,
            sink,
        }
    }

    pub fn penalty_per_day(&self) -> i64 {
        self.config.penalty_per_day
    }

    /// Borrower files a loan request for a book.
    pub async fn request_loan(&self, user_id: i32, request: CreateLoan) -> AppResult<Loan> {
        let now = Utc::now();
        if request.expected_return_date <= now {
            return Err(AppError::Validation(
                "Expected return date must be in the future".to_string(),
            ));
        }
        if let Some(max_days) = self.config.max_loan_days {
            if request.expected_return_date > now + Duration::days(max_days) {
                return Err(AppError::Validation(format!(
                    "Loan duration exceeds the {} day maximum",
                    max_days
                )));
            }
        }

        // Existence checks up front so the borrower gets NotFound, not a
        // foreign key error
        self.repository.users.get_by_id(user_id).await?;
        let book = self.repository.books.get_by_id(request.book_id).await?;

        let code = generate_borrow_code();
        let loan = self
            .repository
            .loans
            .create(user_id, book.id, request.expected_return_date, &code)
            .await?;

        tracing::info!(loan_id = loan.id, user_id, book_id = book.id, "Loan requested");

        self.notify_admins(NotifyEvent {
            title: "Permintaan Peminjaman Baru".to_string(),
            message: format!("Permintaan {} untuk \"{}\"", loan.borrow_code, book.title),
            tag: tags::LOAN_REQUESTED,
            data: serde_json::json!({"loan_id": loan.id}),
        })
        .await;

        Ok(loan)
    }

    /// Admin decision on a pending request.
    pub async fn decide_request(
        &self,
        loan_id: i32,
        approve: bool,
        note: Option<String>,
    ) -> AppResult<Loan> {
        let loan = if approve {
            let loan = self.repository.loans.approve_request(loan_id).await?;
            self.sink
                .notify(
                    loan.user_id,
                    NotifyEvent {
                        title: "Peminjaman Disetujui".to_string(),
                        message: format!(
                            "Permintaan {} disetujui. Silakan ambil buku di perpustakaan.",
                            loan.borrow_code
                        ),
                        tag: tags::LOAN_APPROVED,
                        data: serde_json::json!({"loan_id": loan.id}),
                    },
                )
                .await;
            loan
        } else {
            let loan = self
                .repository
                .loans
                .reject_request(loan_id, note.as_deref())
                .await?;
            self.sink
                .notify(
                    loan.user_id,
                    NotifyEvent {
                        title: "Peminjaman Ditolak".to_string(),
                        message: note.unwrap_or_else(|| {
                            format!("Permintaan {} ditolak.", loan.borrow_code)
                        }),
                        tag: tags::LOAN_REJECTED,
                        data: serde_json::json!({"loan_id": loan.id}),
                    },
                )
                .await;
            loan
        };

        tracing::info!(loan_id, approve, "Loan request decided");
        Ok(loan)
    }

    /// Admin confirms the physical handoff: `Approved -> Taken`.
    pub async fn confirm_pickup(&self, loan_id: i32) -> AppResult<Loan> {
        let loan = self
            .repository
            .loans
            .transition(loan_id, &[LoanStatus::Approved], LoanStatus::Taken)
            .await?;

        self.sink
            .notify(
                loan.user_id,
                NotifyEvent {
                    title: "Buku Diserahkan".to_string(),
                    message: format!(
                        "Buku untuk {} sudah diserahkan. Konfirmasi peminjaman di aplikasi.",
                        loan.borrow_code
                    ),
                    tag: tags::LOAN_TAKEN,
                    data: serde_json::json!({"loan_id": loan.id}),
                },
            )
            .await;

        Ok(loan)
    }

    /// Borrower acknowledges the loan start: `Taken -> Borrowing`.
    pub async fn confirm_borrow(&self, loan_id: i32, acting_user_id: i32) -> AppResult<Loan> {
        let current = self.repository.loans.get_by_id(loan_id).await?;
        if current.user_id != acting_user_id {
            return Err(AppError::Authorization(
                "Cannot confirm another user's loan".to_string(),
            ));
        }

        let loan = self
            .repository
            .loans
            .transition(loan_id, &[LoanStatus::Taken], LoanStatus::Borrowing)
            .await?;

        self.sink
            .notify(
                loan.user_id,
                NotifyEvent {
                    title: "Peminjaman Dimulai".to_string(),
                    message: format!(
                        "Peminjaman {} berjalan sampai {}.",
                        loan.borrow_code,
                        loan.expected_return_date.format("%d-%m-%Y")
                    ),
                    tag: tags::LOAN_BORROWING,
                    data: serde_json::json!({"loan_id": loan.id}),
                },
            )
            .await;

        Ok(loan)
    }

    /// One loan with display context.
    pub async fn loan_details(&self, loan_id: i32) -> AppResult<LoanDetails> {
        let row = self.repository.loans.get_join_by_id(loan_id).await?;
        Ok(self.to_details(row, Utc::now()))
    }

    /// All loans of a user, for the borrower's history screen.
    pub async fn user_loans(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.repository.users.get_by_id(user_id).await?;
        let rows = self.repository.loans.list_user_loans(user_id).await?;
        let now = Utc::now();
        Ok(rows.into_iter().map(|r| self.to_details(r, now)).collect())
    }

    /// Admin queue for a stored status.
    pub async fn queue(&self, status: LoanStatus) -> AppResult<Vec<LoanDetails>> {
        let rows = self.repository.loans.list_by_status(status).await?;
        let now = Utc::now();
        Ok(rows.into_iter().map(|r| self.to_details(r, now)).collect())
    }

    /// The borrower-facing fine position: unpaid settled fines plus live
    /// accrual over everything still out.
    pub async fn fine_summary(&self, user_id: i32) -> AppResult<FineSummary> {
        let user = self.repository.users.get_by_id(user_id).await?;
        let out = self.repository.loans.list_out_for_user(user_id).await?;
        Ok(fines::summarize(
            &user,
            &out,
            Utc::now(),
            self.config.penalty_per_day,
        ))
    }

    /// Build display details: overdue classification applied, fine column
    /// showing the frozen amount for settled loans and the live accrual for
    /// loans still out.
    pub(crate) fn to_details(&self, row: LoanJoinRow, now: DateTime<Utc>) -> LoanDetails {
        let loan = row.loan;
        let status = loan.effective_status(now);
        let fine_amount = if loan.status == LoanStatus::Returned {
            loan.fine_amount
        } else if loan.status.is_out() {
            fines::running_fine(&loan, now, self.config.penalty_per_day)
        } else {
            0
        };

        LoanDetails {
            id: loan.id,
            borrow_code: loan.borrow_code,
            user_id: loan.user_id,
            user_name: row.user_name,
            book_id: loan.book_id,
            book_title: row.book_title,
            request_date: loan.request_date,
            expected_return_date: loan.expected_return_date,
            actual_return_date: loan.actual_return_date,
            status,
            status_label: status.to_string(),
            fine_amount,
            pending_fine: loan.pending_fine,
            fine_payment_status: loan.fine_payment_status,
            fine_payment_method: loan.fine_payment_method,
            fine_payment_proof: loan.fine_payment_proof,
            fine_payment_at: loan.fine_payment_at,
            fine_note: loan.fine_note,
            payment_batch_id: loan.payment_batch_id,
            return_proof_url: loan.return_proof_url,
            return_proof_latitude: loan.return_proof_latitude,
            return_proof_longitude: loan.return_proof_longitude,
            return_proof_accuracy_m: loan.return_proof_accuracy_m,
            return_proof_captured_at: loan.return_proof_captured_at,
            return_proof_address: loan.return_proof_address,
            admin_proof_url: loan.admin_proof_url,
        }
    }

    pub(crate) async fn notify_admins(&self, event: NotifyEvent) {
        match self.repository.users.admin_ids().await {
            Ok(ids) => {
                for id in ids {
                    self.sink.notify(id, event.clone()).await;
                }
            }
            Err(e) => tracing::warn!("Cannot load admin ids for fanout: {}", e),
        }
    }
}

/// Human-readable borrow code printed on the pickup slip
fn generate_borrow_code() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("PJM-{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrow_codes_have_stable_shape() {
        let code = generate_borrow_code();
        assert!(code.starts_with("PJM-"));
        assert_eq!(code.len(), 12);
        // Ambiguous glyphs are excluded from the alphabet
        assert!(!code[4..].contains('O'));
        assert!(!code[4..].contains('0'));
        assert!(!code[4..].contains('I'));
        assert!(!code[4..].contains('1'));
    }
}
