//! User management service: accounts, profiles, notification inbox

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{
        notification::{Notification, PushSubscription},
        user::{CreateUser, UpdateProfile, User, UserQuery, UserShort},
    },
    repository::Repository,
    services::{auth, media::MediaStore},
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    media: Arc<dyn MediaStore>,
}

impl UsersService {
    pub fn new(repository: Repository, media: Arc<dyn MediaStore>) -> Self {
        Self { repository, media }
    }

    pub async fn get(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn list(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        self.repository.users.list(query).await
    }

    /// Register an account (admin-created or self-service signup)
    pub async fn create(&self, request: CreateUser) -> AppResult<User> {
        let hash = auth::hash_password(&request.password)?;
        self.repository.users.create(&request, &hash).await
    }

    /// Update own profile; changing the password requires the current one.
    pub async fn update_profile(&self, user_id: i32, update: UpdateProfile) -> AppResult<User> {
        let password_hash = match &update.new_password {
            Some(new_password) => {
                let current = update.current_password.as_deref().ok_or_else(|| {
                    AppError::Validation(
                        "Current password is required to set a new password".to_string(),
                    )
                })?;
                let user = self.repository.users.get_by_id(user_id).await?;
                if !auth::verify_password(current, &user.password) {
                    return Err(AppError::Authentication(
                        "Current password is incorrect".to_string(),
                    ));
                }
                Some(auth::hash_password(new_password)?)
            }
            None => None,
        };

        self.repository
            .users
            .update_profile(
                user_id,
                update.name.as_deref(),
                update.email.as_deref(),
                update.phone.as_deref(),
                update.address.as_deref(),
                password_hash.as_deref(),
            )
            .await
    }

    /// Store a profile photo and remember its URL
    pub async fn set_photo(&self, user_id: i32, filename: &str, bytes: &[u8]) -> AppResult<String> {
        let url = self.media.store(filename, bytes).await?;
        self.repository.users.set_photo(user_id, &url).await?;
        Ok(url)
    }

    /// Notification inbox
    pub async fn notifications(&self, user_id: i32, limit: i64) -> AppResult<Vec<Notification>> {
        self.repository.notifications.list_for_user(user_id, limit).await
    }

    pub async fn mark_notification_read(&self, user_id: i32, notification_id: i32) -> AppResult<()> {
        self.repository
            .notifications
            .mark_read(notification_id, user_id)
            .await
    }

    /// Register a push device token for this user
    pub async fn register_subscription(
        &self,
        user_id: i32,
        device_token: &str,
    ) -> AppResult<PushSubscription> {
        self.repository
            .notifications
            .upsert_subscription(user_id, device_token)
            .await
    }

    pub async fn remove_subscription(&self, user_id: i32, device_token: &str) -> AppResult<()> {
        self.repository
            .notifications
            .remove_subscription(user_id, device_token)
            .await
    }
}
