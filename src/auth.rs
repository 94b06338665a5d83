//! # Caller Identity
//!
//! User-facing endpoints identify the caller by GitHub account id carried
//! verbatim in the `Authorization` header.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::error::{ApiError, validation_error};

/// GitHub account id of the calling user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubIdentity(pub i64);

/// OpenAPI header parameter for the caller's GitHub id
#[derive(Debug, Serialize, Deserialize, IntoParams, utoipa::ToSchema)]
#[into_params(parameter_in = Header)]
pub struct IdentityHeader {
    /// Numeric GitHub account id of the caller
    #[serde(rename = "Authorization")]
    #[param(rename = "Authorization", value_type = String, example = "21031067")]
    pub github_id: String,
}

fn extract_github_id(headers: &HeaderMap) -> Result<i64, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| {
            validation_error(
                "Missing Authorization header",
                serde_json::json!({ "Authorization": "GitHub id is required" }),
            )
        })?
        .to_str()
        .map_err(|_| {
            validation_error(
                "Invalid Authorization header",
                serde_json::json!({ "Authorization": "Header must be visible ASCII" }),
            )
        })?;

    value.trim().parse::<i64>().map_err(|_| {
        validation_error(
            "Invalid Authorization header",
            serde_json::json!({ "Authorization": "GitHub id must be numeric" }),
        )
    })
}

impl<S> FromRequestParts<S> for GitHubIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let github_id = extract_github_id(&parts.headers)?;
        tracing::debug!(github_id, "Identified caller");
        Ok(GitHubIdentity(github_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    async fn whoami(GitHubIdentity(id): GitHubIdentity) -> String {
        id.to_string()
    }

    async fn call(authorization: Option<&str>) -> (StatusCode, String) {
        let mut request = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }

        let response = Router::new()
            .route("/whoami", get(whoami))
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn numeric_header_identifies_caller() {
        let (status, body) = call(Some("21031067")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "21031067");
    }

    #[tokio::test]
    async fn missing_header_returns_400() {
        let (status, body) = call(None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("VALIDATION_FAILED"));
    }

    #[tokio::test]
    async fn non_numeric_header_returns_400() {
        let (status, body) = call(Some("Bearer abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("GitHub id must be numeric"));
    }
}
