//! # Data Models
//!
//! SeaORM entities and the domain records built from them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod installation;
pub mod user;

pub use installation::{AuthorizedRepo, Installation, NewInstallation};
pub use user::Recipient;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "push-request".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
