//! Notification fanout
//!
//! Two layers: a durable audit record in the `notifications` table, and
//! best-effort push delivery through a gateway. State transitions commit
//! first; a dead gateway costs delivery, never data. Subscriptions are
//! persisted per user/device so restarts keep their delivery targets.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    config::PushConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

#[cfg(test)]
use mockall::automock;

/// Event tags, machine-readable for the client
pub mod tags {
    pub const LOAN_REQUESTED: &str = "loan_requested";
    pub const LOAN_APPROVED: &str = "loan_approved";
    pub const LOAN_REJECTED: &str = "loan_rejected";
    pub const LOAN_TAKEN: &str = "loan_taken";
    pub const LOAN_BORROWING: &str = "loan_borrowing";
    pub const RETURN_SUBMITTED: &str = "return_submitted";
    pub const RETURN_APPROVED: &str = "return_approved";
    pub const RETURN_REJECTED: &str = "return_rejected";
    pub const PAYMENT_INITIATED: &str = "payment_initiated";
    pub const PAYMENT_PROOF_SUBMITTED: &str = "payment_proof_submitted";
    pub const PAYMENT_APPROVED: &str = "payment_approved";
    pub const PAYMENT_REJECTED: &str = "payment_rejected";
    pub const DUE_REMINDER: &str = "due_reminder";
}

/// One notification event
#[derive(Debug, Clone)]
pub struct NotifyEvent {
    pub title: String,
    pub message: String,
    pub tag: &'static str,
    pub data: serde_json::Value,
}

/// Sink the workflow services talk to. Fire-and-forget: implementations must
/// never surface transport failures to the caller.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Record the event durably and attempt push delivery.
    async fn notify(&self, user_id: i32, event: NotifyEvent);

    /// Push delivery only, for events whose audit record was already written
    /// transactionally with the state change.
    async fn push_only(&self, user_id: i32, event: NotifyEvent);
}

/// Transport behind the sink, one POST per device token.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, device_token: &str, event: &NotifyEvent) -> AppResult<()>;
}

/// reqwest-based gateway posting to the configured endpoint
pub struct HttpPushGateway {
    client: reqwest::Client,
    config: PushConfig,
}

impl HttpPushGateway {
    pub fn new(config: PushConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build push client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PushGateway for HttpPushGateway {
    async fn send(&self, device_token: &str, event: &NotifyEvent) -> AppResult<()> {
        let mut request = self.client.post(&self.config.gateway_url).json(&serde_json::json!({
            "token": device_token,
            "title": event.title,
            "message": event.message,
            "tag": event.tag,
            "data": event.data,
        }));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Push gateway unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "Push gateway returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Default sink: audit into Postgres, fan out over the user's registered
/// device tokens.
#[derive(Clone)]
pub struct NotificationService {
    repository: Repository,
    gateway: Arc<dyn PushGateway>,
}

impl NotificationService {
    pub fn new(repository: Repository, gateway: Arc<dyn PushGateway>) -> Self {
        Self { repository, gateway }
    }

    /// Deliver to every token, swallowing per-token failures.
    async fn fanout(gateway: &dyn PushGateway, tokens: &[String], event: &NotifyEvent) {
        for token in tokens {
            if let Err(e) = gateway.send(token, event).await {
                tracing::warn!(tag = event.tag, "Push delivery failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl NotificationSink for NotificationService {
    async fn notify(&self, user_id: i32, event: NotifyEvent) {
        // The audit record matters more than delivery; log either failure
        // and move on.
        if let Err(e) = self
            .repository
            .notifications
            .insert(
                user_id,
                &event.title,
                &event.message,
                event.tag,
                Some(event.data.clone()),
            )
            .await
        {
            tracing::error!(user_id, tag = event.tag, "Failed to record notification: {}", e);
        }

        self.push_only(user_id, event).await;
    }

    async fn push_only(&self, user_id: i32, event: NotifyEvent) {
        let tokens = match self.repository.notifications.tokens_for_user(user_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(user_id, "Cannot load push subscriptions: {}", e);
                return;
            }
        };
        if tokens.is_empty() {
            return;
        }
        Self::fanout(self.gateway.as_ref(), &tokens, &event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn event() -> NotifyEvent {
        NotifyEvent {
            title: "Peminjaman Disetujui".to_string(),
            message: "Silakan ambil buku di perpustakaan".to_string(),
            tag: tags::LOAN_APPROVED,
            data: serde_json::json!({"loan_id": 7}),
        }
    }

    #[tokio::test]
    async fn fanout_hits_every_token() {
        let mut gateway = MockPushGateway::new();
        gateway
            .expect_send()
            .with(eq("token-a"), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));
        gateway
            .expect_send()
            .with(eq("token-b"), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));

        let tokens = vec!["token-a".to_string(), "token-b".to_string()];
        NotificationService::fanout(&gateway, &tokens, &event()).await;
    }

    #[tokio::test]
    async fn gateway_failure_is_swallowed_not_propagated() {
        let mut gateway = MockPushGateway::new();
        gateway
            .expect_send()
            .times(2)
            .returning(|_, _| Err(AppError::Internal("gateway down".to_string())));

        let tokens = vec!["token-a".to_string(), "token-b".to_string()];
        // Must not panic or short-circuit after the first failure
        NotificationService::fanout(&gateway, &tokens, &event()).await;
    }
}
