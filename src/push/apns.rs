//! # APNs Client
//!
//! Token-based (ES256 JWT) Apple Push Notification service client sending
//! background notifications over HTTP/2.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{PushClient, PushError, is_valid_device_handle, redact_device_handle};
use crate::config::ApnsConfig;

/// Apple refuses provider tokens older than an hour and throttles
/// regeneration, so one token is reused for most of that window.
const PROVIDER_TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

/// APNs gateway selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApnsEnvironment {
    Development,
    #[default]
    Production,
}

impl ApnsEnvironment {
    pub const fn endpoint(self) -> &'static str {
        match self {
            ApnsEnvironment::Development => "https://api.sandbox.push.apple.com",
            ApnsEnvironment::Production => "https://api.push.apple.com",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ApnsEnvironment::Development => "development",
            ApnsEnvironment::Production => "production",
        }
    }
}

impl fmt::Display for ApnsEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApnsEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "sandbox" => Ok(ApnsEnvironment::Development),
            "production" => Ok(ApnsEnvironment::Production),
            other => Err(format!("unknown APNs environment '{other}'")),
        }
    }
}

/// Fixed background wake-up payload; carries no event data.
pub fn background_payload() -> Value {
    json!({ "aps": { "content-available": 1 } })
}

#[derive(Serialize)]
struct ProviderClaims<'a> {
    iss: &'a str,
    iat: i64,
}

#[derive(Deserialize)]
struct ApnsErrorBody {
    reason: String,
}

struct ProviderToken {
    value: String,
    issued: Instant,
}

/// APNs HTTP/2 client authenticated with a provider token.
pub struct ApnsClient {
    http: Client,
    endpoint: String,
    topic: String,
    key_id: String,
    team_id: String,
    signing_key: EncodingKey,
    token: Mutex<Option<ProviderToken>>,
}

impl fmt::Debug for ApnsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApnsClient")
            .field("endpoint", &self.endpoint)
            .field("topic", &self.topic)
            .field("key_id", &self.key_id)
            .field("team_id", &self.team_id)
            .finish_non_exhaustive()
    }
}

impl ApnsClient {
    /// Build a client from configuration. The auth key is the base64-encoded
    /// `.p8` PEM issued by Apple.
    pub fn from_config(config: &ApnsConfig) -> Result<Self, PushError> {
        let auth_key = required(&config.auth_key, "APNS_AUTH_KEY")?;
        let pem = general_purpose::STANDARD
            .decode(auth_key.trim())
            .map_err(|e| PushError::Configuration(format!("APNS_AUTH_KEY is not base64: {e}")))?;
        let signing_key = EncodingKey::from_ec_pem(&pem)?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.environment.endpoint().to_string(),
            topic: required(&config.topic, "APNS_TOPIC")?.to_string(),
            key_id: required(&config.key_id, "APNS_KEY_ID")?.to_string(),
            team_id: required(&config.team_id, "APNS_TEAM_ID")?.to_string(),
            signing_key,
            token: Mutex::new(None),
        })
    }

    /// Override the gateway base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current provider token, signing a fresh one when the cached token has
    /// aged out.
    fn provider_token(&self) -> Result<String, PushError> {
        let mut cached = self
            .token
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        if let Some(token) = cached.as_ref() {
            if token.issued.elapsed() < PROVIDER_TOKEN_TTL {
                return Ok(token.value.clone());
            }
        }

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = ProviderClaims {
            iss: &self.team_id,
            iat: chrono::Utc::now().timestamp(),
        };
        let value = jsonwebtoken::encode(&header, &claims, &self.signing_key)?;
        debug!(key_id = %self.key_id, "Signed new APNs provider token");

        *cached = Some(ProviderToken {
            value: value.clone(),
            issued: Instant::now(),
        });
        Ok(value)
    }
}

#[async_trait]
impl PushClient for ApnsClient {
    async fn send(&self, device_handle: &str) -> Result<(), PushError> {
        if !is_valid_device_handle(device_handle) {
            return Err(PushError::InvalidDeviceToken(redact_device_handle(
                device_handle,
            )));
        }
        let token = self.provider_token()?;
        let url = format!("{}/3/device/{}", self.endpoint, device_handle);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("apns-topic", &self.topic)
            .header("apns-push-type", "background")
            .header("apns-priority", "5")
            .json(&background_payload())
            .send()
            .await
            .map_err(|err| PushError::Transport(err.without_url()))?;

        let status = response.status();
        if status.is_success() {
            debug!(device = %redact_device_handle(device_handle), "APNs accepted notification");
            return Ok(());
        }

        let reason = response
            .json::<ApnsErrorBody>()
            .await
            .map(|body| body.reason)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());

        warn!(
            device = %redact_device_handle(device_handle),
            status = status.as_u16(),
            reason = %reason,
            "APNs rejected notification"
        );

        Err(PushError::Rejected {
            status: status.as_u16(),
            reason,
        })
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, PushError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PushError::Configuration(format!("{key} is not set")))
}
