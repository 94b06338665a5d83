//! # Webhook Handler
//!
//! Single intake for GitHub App deliveries. The `X-GitHub-Event` header
//! selects the payload shape; the dispatcher decides what happens next.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::dispatch::{DispatchOutcome, WebhookOutcome};
use crate::error::ApiError;
use crate::events::WebhookPayload;
use crate::events::payload::EVENT_KIND_HEADER;
use crate::server::AppState;

const DELIVERY_ID_HEADER: &str = "x-github-delivery";

/// Webhook acknowledgement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAckResponse {
    /// One of `installation_created`, `ignored`, `filtered`, `delivered`
    #[schema(example = "delivered")]
    pub status: String,
    /// Devices notified, when delivered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices: Option<usize>,
}

impl From<&WebhookOutcome> for WebhookAckResponse {
    fn from(outcome: &WebhookOutcome) -> Self {
        let devices = match outcome {
            WebhookOutcome::Dispatched(DispatchOutcome::Delivered { devices }) => Some(*devices),
            _ => None,
        };
        Self {
            status: outcome.as_str().to_string(),
            devices,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Receive a GitHub App webhook delivery
#[utoipa::path(
    post,
    path = "/webhook",
    params(
        ("X-GitHub-Event" = String, Header, description = "GitHub event kind, e.g. `pull_request`"),
        ("X-GitHub-Delivery" = Option<String>, Header, description = "GitHub delivery GUID, logged for correlation"),
    ),
    request_body(content = serde_json::Value, description = "GitHub webhook payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Delivered, filtered or ignored", body = WebhookAckResponse),
        (status = 201, description = "Installation recorded", body = WebhookAckResponse),
        (status = 400, description = "Missing event header or malformed payload", body = ApiError),
        (status = 404, description = "Unknown installation or user", body = ApiError),
        (status = 413, description = "Payload too large"),
        (status = 500, description = "Storage failure", body = ApiError),
        (status = 502, description = "Push delivery failed", body = ApiError),
        (status = 503, description = "Database unreachable", body = ApiError)
    ),
    tag = "webhooks"
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAckResponse>), ApiError> {
    let kind = header_str(&headers, EVENT_KIND_HEADER);
    let delivery_id = header_str(&headers, DELIVERY_ID_HEADER);

    let payload = WebhookPayload::decode(kind, &body).inspect_err(|err| {
        counter!("webhook_deliveries_total", "outcome" => "rejected").increment(1);
        warn!(kind, delivery_id, error = %err, "Rejected webhook delivery");
    })?;

    match state.dispatcher().handle(payload).await {
        Ok(outcome) => {
            counter!("webhook_deliveries_total", "outcome" => outcome.as_str()).increment(1);
            info!(kind, delivery_id, outcome = outcome.as_str(), "Processed webhook delivery");

            let status = match outcome {
                WebhookOutcome::InstallationCreated => StatusCode::CREATED,
                _ => StatusCode::OK,
            };
            Ok((status, Json(WebhookAckResponse::from(&outcome))))
        }
        Err(err) => {
            counter!("webhook_deliveries_total", "outcome" => err.as_str()).increment(1);
            warn!(kind, delivery_id, error = %err, "Webhook processing failed");
            Err(err.into())
        }
    }
}
