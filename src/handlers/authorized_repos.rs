//! # Authorized Repositories Handler

use std::collections::HashSet;

use axum::{extract::State, response::Json};

use crate::auth::{GitHubIdentity, IdentityHeader};
use crate::error::ApiError;
use crate::models::AuthorizedRepo;
use crate::repositories::InstallationRegistry;
use crate::server::AppState;

/// Repositories the caller granted the app access to, across all of their
/// installations, without duplicates
#[utoipa::path(
    get,
    path = "/authorized_repos",
    params(IdentityHeader),
    responses(
        (status = 200, description = "Authorized repositories", body = [AuthorizedRepo]),
        (status = 400, description = "Missing or non-numeric Authorization header", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "users"
)]
pub async fn list_authorized_repos(
    State(state): State<AppState>,
    GitHubIdentity(github_id): GitHubIdentity,
) -> Result<Json<Vec<AuthorizedRepo>>, ApiError> {
    let installations = state.installations().list_by_owner(github_id).await?;

    let mut seen = HashSet::new();
    let repos = installations
        .into_iter()
        .flat_map(|installation| installation.authorized_repos)
        .filter(|repo| seen.insert(repo.clone()))
        .collect();

    Ok(Json(repos))
}
