//! # User Repository
//!
//! SeaORM-backed [`RecipientStore`] over the `users` table.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use super::{RecipientStore, StoreError, is_unique_violation};
use crate::events::EventType;
use crate::models::Recipient;
use crate::models::user::{ActiveModel as UserActiveModel, Column, Entity as User};

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Create a new UserRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn active_model(recipient: &Recipient) -> Result<UserActiveModel, StoreError> {
        let now = Utc::now().fixed_offset();
        Ok(UserActiveModel {
            github_id: Set(recipient.recipient_id),
            device_tokens: Set(serde_json::to_value(&recipient.device_handles)?),
            allowed_types: Set(serde_json::to_value(&recipient.allowed_types)?),
            latest_event: Set(recipient
                .latest_event
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?),
            created_at: Set(now),
            updated_at: Set(now),
        })
    }
}

#[async_trait]
impl RecipientStore for UserRepository {
    async fn create(
        &self,
        recipient_id: i64,
        device_handle: String,
        allowed_types: BTreeSet<EventType>,
    ) -> Result<Recipient, StoreError> {
        let recipient = Recipient::new(recipient_id, device_handle, allowed_types);

        Self::active_model(&recipient)?
            .insert(&self.db)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::AlreadyExists(format!("user {recipient_id}"))
                } else {
                    StoreError::database_error(err)
                }
            })?;

        Ok(recipient)
    }

    async fn get(&self, recipient_id: i64) -> Result<Option<Recipient>, StoreError> {
        let model = User::find_by_id(recipient_id)
            .one(&self.db)
            .await
            .map_err(StoreError::database_error)?;

        Ok(model.map(Recipient::try_from).transpose()?)
    }

    async fn save(&self, recipient: &Recipient) -> Result<(), StoreError> {
        User::insert(Self::active_model(recipient)?)
            .on_conflict(
                OnConflict::column(Column::GithubId)
                    .update_columns([
                        Column::DeviceTokens,
                        Column::AllowedTypes,
                        Column::LatestEvent,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(StoreError::database_error)?;

        Ok(())
    }
}
