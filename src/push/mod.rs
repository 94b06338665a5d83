//! # Push Delivery
//!
//! Background wake-up notifications to registered iOS devices. The
//! dispatcher only sees the [`PushClient`] trait; the APNs client and a
//! logging stand-in for local profiles implement it.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub mod apns;

pub use apns::{ApnsClient, ApnsEnvironment};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push gateway rejected notification with status {status}: {reason}")]
    Rejected { status: u16, reason: String },
    #[error("push transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to sign provider token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("invalid push client configuration: {0}")]
    Configuration(String),
    #[error("device token {0} is not a hex string")]
    InvalidDeviceToken(String),
}

/// Sends a content-free background notification to one device.
#[async_trait]
pub trait PushClient: Send + Sync {
    async fn send(&self, device_handle: &str) -> Result<(), PushError>;
}

/// Push client for profiles without APNs credentials; records the send
/// and succeeds.
#[derive(Debug, Default, Clone)]
pub struct LoggingPushClient;

#[async_trait]
impl PushClient for LoggingPushClient {
    async fn send(&self, device_handle: &str) -> Result<(), PushError> {
        warn!(
            device = %redact_device_handle(device_handle),
            "APNs not configured; skipping push notification"
        );
        Ok(())
    }
}

/// Longest accepted device token, in hex characters.
pub const MAX_DEVICE_HANDLE_LEN: usize = 200;

/// APNs device tokens are non-empty hex strings.
pub fn is_valid_device_handle(device_handle: &str) -> bool {
    !device_handle.is_empty()
        && device_handle.len() <= MAX_DEVICE_HANDLE_LEN
        && device_handle.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Shorten a device token for log output.
pub fn redact_device_handle(device_handle: &str) -> String {
    let prefix: String = device_handle.chars().take(8).collect();
    if prefix.len() < device_handle.len() {
        format!("{prefix}...")
    } else {
        prefix
    }
}
