//! # User Model
//!
//! A push recipient keyed by GitHub account id, with registered device
//! tokens, subscribed event types and the latest event that reached them.

use std::collections::BTreeSet;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::events::{Event, EventType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub github_id: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub device_tokens: Json,

    #[sea_orm(column_type = "JsonBinary")]
    pub allowed_types: Json,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub latest_event: Option<Json>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Recipient of push notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub recipient_id: i64,
    /// Device tokens in registration order, no duplicates
    pub device_handles: Vec<String>,
    pub allowed_types: BTreeSet<EventType>,
    pub latest_event: Option<Event>,
}

impl Recipient {
    pub fn new(
        recipient_id: i64,
        device_handle: impl Into<String>,
        allowed_types: BTreeSet<EventType>,
    ) -> Self {
        Self {
            recipient_id,
            device_handles: vec![device_handle.into()],
            allowed_types,
            latest_event: None,
        }
    }

    /// Append a device token unless already registered. Returns true when added.
    pub fn add_device_handle(&mut self, device_handle: &str) -> bool {
        if self.device_handles.iter().any(|h| h == device_handle) {
            return false;
        }
        self.device_handles.push(device_handle.to_string());
        true
    }

    /// Replace all device tokens, dropping duplicates but keeping first-seen order.
    pub fn replace_device_handles(&mut self, device_handles: Vec<String>) {
        self.device_handles.clear();
        for handle in device_handles {
            self.add_device_handle(&handle);
        }
    }
}

impl TryFrom<Model> for Recipient {
    type Error = serde_json::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            recipient_id: model.github_id,
            device_handles: serde_json::from_value(model.device_tokens)?,
            allowed_types: serde_json::from_value(model.allowed_types)?,
            latest_event: model
                .latest_event
                .filter(|value| !value.is_null())
                .map(serde_json::from_value)
                .transpose()?,
        })
    }
}
