//! Due-date reminder sweep
//!
//! Periodic read-only pass over loans still out with the borrower: due soon
//! or already late. Fans out notifications and writes nothing to loan state;
//! overdue is a classification here, not a transition.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::{
    config::LoanConfig,
    error::AppResult,
    repository::Repository,
    services::{
        fines,
        notify::{tags, NotificationSink, NotifyEvent},
    },
};

#[derive(Clone)]
pub struct RemindersService {
    repository: Repository,
    config: LoanConfig,
    sink: Arc<dyn NotificationSink>,
}

impl RemindersService {
    pub fn new(repository: Repository, config: LoanConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            repository,
            config,
            sink,
        }
    }

    /// Run sweeps forever at the configured interval.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(self.config.reminder_interval_secs));
            loop {
                interval.tick().await;
                if let Err(e) = self.sweep().await {
                    tracing::error!("Reminder sweep failed: {}", e);
                }
            }
        })
    }

    /// One pass: remind every borrower whose loan is due within the window
    /// or already late.
    pub async fn sweep(&self) -> AppResult<usize> {
        let now = Utc::now();
        let due_before = now + Duration::days(self.config.reminder_days_before_due);
        let rows = self.repository.loans.list_due_for_reminder(due_before).await?;
        let count = rows.len();

        for row in rows {
            let loan = row.loan;
            let title = row.book_title.unwrap_or_else(|| "buku".to_string());

            let event = if loan.is_past_due(now) {
                let fine = fines::running_fine(&loan, now, self.config.penalty_per_day);
                NotifyEvent {
                    title: "Peminjaman Terlambat".to_string(),
                    message: format!(
                        "\"{}\" terlambat dikembalikan. Denda berjalan: Rp{}.",
                        title, fine
                    ),
                    tag: tags::DUE_REMINDER,
                    data: serde_json::json!({"loan_id": loan.id, "running_fine": fine}),
                }
            } else {
                NotifyEvent {
                    title: "Pengingat Pengembalian".to_string(),
                    message: format!(
                        "\"{}\" jatuh tempo {}.",
                        title,
                        loan.expected_return_date.format("%d-%m-%Y")
                    ),
                    tag: tags::DUE_REMINDER,
                    data: serde_json::json!({"loan_id": loan.id}),
                }
            };

            self.sink.notify(loan.user_id, event).await;
        }

        if count > 0 {
            tracing::info!(count, "Reminder sweep notified borrowers");
        }
        Ok(count)
    }
}
