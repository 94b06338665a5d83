//! # Installation Model
//!
//! One row per installation-created webhook received. Rows for the same
//! `installation_id` may repeat; readers use the earliest.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "installations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub installation_id: i64,

    /// GitHub account id of the installing user
    pub owner_id: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub authorized_repos: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Repository the GitHub App was granted access to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct AuthorizedRepo {
    pub id: i64,
    #[schema(example = "octocat/Hello-World")]
    pub full_name: String,
}

/// Data recorded for a newly created installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstallation {
    pub installation_id: i64,
    pub owner_id: i64,
    pub authorized_repos: Vec<AuthorizedRepo>,
}

/// Stored installation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub installation_id: i64,
    pub owner_id: i64,
    pub authorized_repos: Vec<AuthorizedRepo>,
}

impl TryFrom<Model> for Installation {
    type Error = serde_json::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            installation_id: model.installation_id,
            owner_id: model.owner_id,
            authorized_repos: serde_json::from_value(model.authorized_repos)?,
        })
    }
}
