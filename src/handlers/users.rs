//! # User Handlers
//!
//! Registration and self-service management of push recipients.

use std::collections::BTreeSet;

use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::auth::{GitHubIdentity, IdentityHeader};
use crate::error::{ApiError, not_found, validation_error};
use crate::events::{Event, EventType};
use crate::models::Recipient;
use crate::push::{MAX_DEVICE_HANDLE_LEN, is_valid_device_handle};
use crate::repositories::{RecipientStore, StoreError};
use crate::server::AppState;

/// Request body for registering a device
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RegisterUserRequest {
    /// GitHub account id of the user
    #[schema(example = 21031067)]
    pub github_id: i64,
    /// Device tokens; the first one is registered
    pub device_tokens: Vec<String>,
    /// Event types to be notified about
    #[serde(default)]
    pub allowed_types: Vec<EventType>,
}

/// Request body for updating a user; present fields are replaced wholesale
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub allowed_types: Option<Vec<EventType>>,
    #[serde(default)]
    pub device_tokens: Option<Vec<String>>,
}

/// User representation returned by the API
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UserResponse {
    pub github_id: i64,
    pub device_tokens: Vec<String>,
    pub allowed_types: Vec<EventType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_event: Option<Event>,
}

impl From<Recipient> for UserResponse {
    fn from(recipient: Recipient) -> Self {
        Self {
            github_id: recipient.recipient_id,
            device_tokens: recipient.device_handles,
            allowed_types: recipient.allowed_types.into_iter().collect(),
            latest_event: recipient.latest_event,
        }
    }
}

fn validate_device_tokens(device_tokens: &[String]) -> Result<(), ApiError> {
    if device_tokens.is_empty() {
        return Err(validation_error(
            "At least one device token is required",
            json!({ "device_tokens": "must not be empty" }),
        ));
    }
    if device_tokens
        .iter()
        .any(|token| !is_valid_device_handle(token.trim()))
    {
        return Err(validation_error(
            "Device tokens must be hex strings",
            json!({
                "device_tokens": format!(
                    "each token must be 1 to {MAX_DEVICE_HANDLE_LEN} hex characters"
                )
            }),
        ));
    }
    Ok(())
}

/// Append a device token to an existing recipient, saving only on change.
async fn append_device(
    recipients: &dyn RecipientStore,
    mut recipient: Recipient,
    device_token: &str,
) -> Result<Recipient, StoreError> {
    if recipient.add_device_handle(device_token) {
        recipients.save(&recipient).await?;
        info!(github_id = recipient.recipient_id, "Added device token to user");
    }
    Ok(recipient)
}

/// Create the recipient, or append the token when it already exists.
/// Returns the recipient and whether it was created.
async fn register_device(
    recipients: &dyn RecipientStore,
    github_id: i64,
    device_token: String,
    allowed_types: BTreeSet<EventType>,
) -> Result<(Recipient, bool), StoreError> {
    if let Some(recipient) = recipients.get(github_id).await? {
        let recipient = append_device(recipients, recipient, &device_token).await?;
        return Ok((recipient, false));
    }

    match recipients
        .create(github_id, device_token.clone(), allowed_types)
        .await
    {
        Ok(recipient) => {
            info!(github_id, "Registered user");
            Ok((recipient, true))
        }
        // A concurrent registration created the user after the lookup.
        Err(already_exists @ StoreError::AlreadyExists(_)) => {
            let Some(recipient) = recipients.get(github_id).await? else {
                return Err(already_exists);
            };
            let recipient = append_device(recipients, recipient, &device_token).await?;
            Ok((recipient, false))
        }
        Err(err) => Err(err),
    }
}

/// Register a user, or add a device token to an existing user
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 200, description = "Existing user; device token added if new", body = UserResponse),
        (status = 400, description = "Invalid request body", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "users"
)]
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(request) = payload?;
    validate_device_tokens(&request.device_tokens)?;
    let device_token = request.device_tokens[0].trim().to_string();

    let (recipient, created) = register_device(
        &state.recipients(),
        request.github_id,
        device_token,
        request.allowed_types.into_iter().collect(),
    )
    .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(recipient.into())))
}

/// Get the calling user
#[utoipa::path(
    get,
    path = "/users",
    params(IdentityHeader),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 400, description = "Missing or non-numeric Authorization header", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    GitHubIdentity(github_id): GitHubIdentity,
) -> Result<Json<UserResponse>, ApiError> {
    let recipient = state
        .recipients()
        .get(github_id)
        .await?
        .ok_or_else(|| not_found(&format!("User {github_id} not found")))?;

    Ok(Json(recipient.into()))
}

/// Update the calling user's subscriptions and device tokens
#[utoipa::path(
    patch,
    path = "/users",
    params(IdentityHeader),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid header or request body", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    GitHubIdentity(github_id): GitHubIdentity,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(request) = payload?;
    if let Some(device_tokens) = &request.device_tokens {
        validate_device_tokens(device_tokens)?;
    }

    let recipients = state.recipients();
    let mut recipient = recipients
        .get(github_id)
        .await?
        .ok_or_else(|| not_found(&format!("User {github_id} not found")))?;

    if let Some(allowed_types) = request.allowed_types {
        recipient.allowed_types = allowed_types.into_iter().collect();
    }
    if let Some(device_tokens) = request.device_tokens {
        recipient.replace_device_handles(
            device_tokens
                .into_iter()
                .map(|token| token.trim().to_string())
                .collect(),
        );
    }

    recipients.save(&recipient).await?;
    info!(github_id, "Updated user");

    Ok(Json(recipient.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    const DEVICE_A: &str = "740f4707bebcf74f9b7c25d48e3358945f6aa01da5ddb387462c7eaf61bb78ad";
    const DEVICE_B: &str = "0b8e3c2ad3b7f1e69f07a4c5d2e1b3a4c5d6e7f8091a2b3c4d5e6f708192a3b4";

    /// Store where another registration lands between the lookup and the
    /// insert: the first `get` misses although the user exists.
    struct ConcurrentlyRegistered {
        stored: Mutex<Recipient>,
        lookup_missed: AtomicBool,
    }

    impl ConcurrentlyRegistered {
        fn new(existing: Recipient) -> Self {
            Self {
                stored: Mutex::new(existing),
                lookup_missed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl RecipientStore for ConcurrentlyRegistered {
        async fn create(
            &self,
            recipient_id: i64,
            _device_handle: String,
            _allowed_types: BTreeSet<EventType>,
        ) -> Result<Recipient, StoreError> {
            Err(StoreError::AlreadyExists(format!("user {recipient_id}")))
        }

        async fn get(&self, _recipient_id: i64) -> Result<Option<Recipient>, StoreError> {
            if !self.lookup_missed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(Some(self.stored.lock().unwrap().clone()))
        }

        async fn save(&self, recipient: &Recipient) -> Result<(), StoreError> {
            *self.stored.lock().unwrap() = recipient.clone();
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_registration_appends_instead_of_conflicting() {
        let store = ConcurrentlyRegistered::new(Recipient::new(
            7,
            DEVICE_A,
            BTreeSet::from([EventType::PrMerged]),
        ));

        let (recipient, created) =
            register_device(&store, 7, DEVICE_B.to_string(), BTreeSet::new())
                .await
                .unwrap();

        assert!(!created);
        assert_eq!(recipient.device_handles, vec![DEVICE_A, DEVICE_B]);
        assert_eq!(
            store.stored.lock().unwrap().device_handles,
            vec![DEVICE_A, DEVICE_B]
        );
        assert!(recipient.allowed_types.contains(&EventType::PrMerged));
    }

    #[test]
    fn device_tokens_must_be_hex() {
        assert!(validate_device_tokens(&[DEVICE_A.to_string()]).is_ok());
        assert!(validate_device_tokens(&[]).is_err());

        for bad in ["device-a", "abc/def", "abc?x=1", "  "] {
            let err = validate_device_tokens(&[bad.to_string()]).unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST, "{bad}");
        }
    }
}
