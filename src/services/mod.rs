//! Business logic services

pub mod auth;
pub mod catalog;
pub mod fines;
pub mod loans;
pub mod media;
pub mod notify;
pub mod payments;
pub mod reminders;
pub mod returns;
pub mod users;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::AppResult,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub loans: loans::LoansService,
    pub returns: returns::ReturnsService,
    pub payments: payments::PaymentsService,
    pub reminders: reminders::RemindersService,
}

impl Services {
    /// Wire all services over the shared repository. The notification sink
    /// and media store are built here and injected as capabilities.
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let gateway = Arc::new(notify::HttpPushGateway::new(config.push.clone())?);
        let sink: Arc<dyn notify::NotificationSink> =
            Arc::new(notify::NotificationService::new(repository.clone(), gateway));
        let media: Arc<dyn media::MediaStore> =
            Arc::new(media::LocalMediaStore::new(&config.media));

        let loans = loans::LoansService::new(repository.clone(), config.loans.clone(), sink.clone());

        Ok(Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), media.clone()),
            users: users::UsersService::new(repository.clone(), media.clone()),
            returns: returns::ReturnsService::new(
                repository.clone(),
                loans.clone(),
                media.clone(),
                sink.clone(),
            ),
            payments: payments::PaymentsService::new(
                repository.clone(),
                loans.clone(),
                media,
                sink.clone(),
            ),
            reminders: reminders::RemindersService::new(
                repository.clone(),
                config.loans.clone(),
                sink,
            ),
            loans,
            repository,
        })
    }
}
