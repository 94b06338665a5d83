//! # Repository Layer
//!
//! Storage collaborators used by the dispatcher and HTTP handlers, and their
//! SeaORM-backed implementations.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::events::EventType;
use crate::models::{Installation, NewInstallation, Recipient};

pub mod installation;
pub mod user;

pub use installation::InstallationRepository;
pub use user::UserRepository;

/// Errors raised by storage collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] DbErr),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("stored record is unreadable: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StoreError {
    pub fn database_error(err: DbErr) -> Self {
        StoreError::Database(err)
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        StoreError::Database(err)
    }
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Lookup of GitHub App installations to the user who installed them.
#[async_trait]
pub trait InstallationRegistry: Send + Sync {
    /// Record an installation. Insert-only; repeated ids produce repeated rows.
    async fn create(&self, installation: NewInstallation) -> Result<(), StoreError>;

    /// Earliest record for the installation id, if any.
    async fn get(&self, installation_id: i64) -> Result<Option<Installation>, StoreError>;

    /// All installations made by the given GitHub account, oldest first.
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Installation>, StoreError>;
}

/// Persistence for push recipients.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Create a recipient with a single device token.
    async fn create(
        &self,
        recipient_id: i64,
        device_handle: String,
        allowed_types: BTreeSet<EventType>,
    ) -> Result<Recipient, StoreError>;

    async fn get(&self, recipient_id: i64) -> Result<Option<Recipient>, StoreError>;

    /// Upsert every mutable field of the recipient.
    async fn save(&self, recipient: &Recipient) -> Result<(), StoreError>;
}
