//! # Notification Dispatch
//!
//! Resolves the owner of the installation an event belongs to, applies the
//! owner's subscription filter, records the event as their latest and wakes
//! every registered device.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::payload::InstallationEvent;
use crate::events::{Event, WebhookPayload, normalize};
use crate::models::{AuthorizedRepo, NewInstallation};
use crate::push::{PushClient, redact_device_handle};
use crate::repositories::{InstallationRegistry, RecipientStore, StoreError};
use crate::subscription;

/// How a push failure on one device affects the remaining devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutPolicy {
    /// Stop at the first failed device.
    #[default]
    FailFast,
    /// Attempt every device and report all failures.
    BestEffort,
}

impl FanOutPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            FanOutPolicy::FailFast => "fail_fast",
            FanOutPolicy::BestEffort => "best_effort",
        }
    }
}

impl fmt::Display for FanOutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FanOutPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail_fast" => Ok(FanOutPolicy::FailFast),
            "best_effort" => Ok(FanOutPolicy::BestEffort),
            other => Err(format!(
                "unknown fan-out policy '{other}', expected 'fail_fast' or 'best_effort'"
            )),
        }
    }
}

/// A push that did not reach a device. Failures end up in webhook
/// responses, so the device token is only kept in redacted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFailure {
    /// Position of the device in the recipient's registration order
    pub device_index: usize,
    /// Redacted device token
    pub device: String,
    pub error: String,
}

/// Result of dispatching a normalized event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The owner is not subscribed to this event type.
    Filtered,
    Delivered { devices: usize },
}

/// Result of handling a whole webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    InstallationCreated,
    /// Unsupported kind, action or state.
    Ignored,
    Dispatched(DispatchOutcome),
}

impl WebhookOutcome {
    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::InstallationCreated => "installation_created",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Dispatched(DispatchOutcome::Filtered) => "filtered",
            WebhookOutcome::Dispatched(DispatchOutcome::Delivered { .. }) => "delivered",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("installation {installation_id} not found")]
    InstallationNotFound { installation_id: i64 },
    #[error("user {recipient_id} not found")]
    RecipientNotFound { recipient_id: i64 },
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("push delivery failed for {} device(s)", failures.len())]
    Delivery { failures: Vec<DeviceFailure> },
}

impl DispatchError {
    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchError::InstallationNotFound { .. } => "installation_not_found",
            DispatchError::RecipientNotFound { .. } => "recipient_not_found",
            DispatchError::Storage(_) => "storage_error",
            DispatchError::Delivery { .. } => "delivery_failed",
        }
    }
}

/// Webhook processing pipeline over injected collaborators.
#[derive(Clone)]
pub struct Dispatcher {
    installations: Arc<dyn InstallationRegistry>,
    recipients: Arc<dyn RecipientStore>,
    push: Arc<dyn PushClient>,
    policy: FanOutPolicy,
}

impl Dispatcher {
    pub fn new(
        installations: Arc<dyn InstallationRegistry>,
        recipients: Arc<dyn RecipientStore>,
        push: Arc<dyn PushClient>,
    ) -> Self {
        Self {
            installations,
            recipients,
            push,
            policy: FanOutPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FanOutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FanOutPolicy {
        self.policy
    }

    /// Run a decoded webhook through the pipeline.
    pub async fn handle(&self, payload: WebhookPayload) -> Result<WebhookOutcome, DispatchError> {
        if let WebhookPayload::Installation(event) = &payload {
            let created = self.on_installation_signal(event).await?;
            return Ok(if created {
                WebhookOutcome::InstallationCreated
            } else {
                WebhookOutcome::Ignored
            });
        }

        match normalize(&payload) {
            Some(event) => Ok(WebhookOutcome::Dispatched(self.dispatch(&event).await?)),
            None => {
                debug!(
                    kind = payload.kind(),
                    action = payload.action().unwrap_or(""),
                    "Ignoring unsupported webhook"
                );
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Record an installation on `created`; other actions are no-ops.
    pub async fn on_installation_signal(
        &self,
        event: &InstallationEvent,
    ) -> Result<bool, DispatchError> {
        if event.action != "created" {
            debug!(action = %event.action, "Ignoring installation action");
            return Ok(false);
        }

        let installation = NewInstallation {
            installation_id: event.installation.id,
            owner_id: event.installation.account.id,
            authorized_repos: event
                .repositories
                .iter()
                .map(|repo| AuthorizedRepo {
                    id: repo.id,
                    full_name: repo.full_name.clone(),
                })
                .collect(),
        };

        self.installations.create(installation).await?;

        info!(
            installation_id = event.installation.id,
            owner_id = event.installation.account.id,
            repos = event.repositories.len(),
            "Recorded installation"
        );
        Ok(true)
    }

    /// Deliver a normalized event to the installation owner's devices.
    pub async fn dispatch(&self, event: &Event) -> Result<DispatchOutcome, DispatchError> {
        let installation = self
            .installations
            .get(event.installation_id)
            .await?
            .ok_or(DispatchError::InstallationNotFound {
                installation_id: event.installation_id,
            })?;

        let mut recipient = self
            .recipients
            .get(installation.owner_id)
            .await?
            .ok_or(DispatchError::RecipientNotFound {
                recipient_id: installation.owner_id,
            })?;

        if !subscription::matches(&recipient.allowed_types, event) {
            debug!(
                recipient_id = recipient.recipient_id,
                event_type = %event.event_type,
                "Event filtered by subscription"
            );
            return Ok(DispatchOutcome::Filtered);
        }

        recipient.latest_event = Some(event.clone());
        self.recipients.save(&recipient).await?;

        let mut failures = Vec::new();
        let mut delivered = 0;
        for (device_index, device_handle) in recipient.device_handles.iter().enumerate() {
            match self.push.send(device_handle).await {
                Ok(()) => {
                    delivered += 1;
                    counter!("push_notifications_sent_total").increment(1);
                }
                Err(err) => {
                    counter!("push_notifications_failed_total").increment(1);
                    warn!(
                        recipient_id = recipient.recipient_id,
                        device = %redact_device_handle(device_handle),
                        error = %err,
                        "Push notification failed"
                    );
                    failures.push(DeviceFailure {
                        device_index,
                        device: redact_device_handle(device_handle),
                        error: err.to_string(),
                    });
                    if self.policy == FanOutPolicy::FailFast {
                        break;
                    }
                }
            }
        }

        if !failures.is_empty() {
            return Err(DispatchError::Delivery { failures });
        }

        info!(
            recipient_id = recipient.recipient_id,
            event_type = %event.event_type,
            devices = delivered,
            "Event delivered"
        );
        Ok(DispatchOutcome::Delivered { devices: delivered })
    }
}
