//! Shared helpers for integration tests: an in-memory SQLite database with
//! migrations applied, a recording push client, and request builders.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use migration::{Migrator, MigratorTrait};
use push_request::{
    config::AppConfig,
    dispatch::FanOutPolicy,
    events::EventType,
    models::{AuthorizedRepo, NewInstallation, Recipient},
    push::{PushClient, PushError},
    repositories::{InstallationRegistry, InstallationRepository, RecipientStore, UserRepository},
    server::{AppState, create_app},
};
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;

pub const OWNER_ID: i64 = 21031067;
pub const INSTALLATION_ID: i64 = 2311213;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Push client that records every device it was asked to notify and fails
/// for the configured devices.
#[derive(Default)]
pub struct RecordingPush {
    sent: Mutex<Vec<String>>,
    failing: BTreeSet<String>,
}

impl RecordingPush {
    pub fn failing_for(devices: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: devices.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushClient for RecordingPush {
    async fn send(&self, device_handle: &str) -> Result<(), PushError> {
        self.sent.lock().unwrap().push(device_handle.to_string());
        if self.failing.contains(device_handle) {
            return Err(PushError::Rejected {
                status: 410,
                reason: "Unregistered".to_string(),
            });
        }
        Ok(())
    }
}

/// Test application wired to a fresh database and a recording push client.
pub struct TestApp {
    pub state: AppState,
    pub push: Arc<RecordingPush>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with(RecordingPush::default(), FanOutPolicy::FailFast).await
    }

    pub async fn with(push: RecordingPush, fanout_policy: FanOutPolicy) -> Result<Self> {
        let db = setup_test_db().await?;
        let push = Arc::new(push);
        let config = AppConfig {
            profile: "test".to_string(),
            database_url: "sqlite::memory:".to_string(),
            fanout_policy,
            ..AppConfig::default()
        };
        let state = AppState::new(config, db, push.clone());
        Ok(Self { state, push })
    }

    pub fn router(&self) -> Router {
        create_app(self.state.clone())
    }

    pub fn installations(&self) -> InstallationRepository {
        self.state.installations()
    }

    pub fn recipients(&self) -> UserRepository {
        self.state.recipients()
    }

    /// Record an installation of the app by `owner_id` covering `repos`.
    pub async fn seed_installation(
        &self,
        installation_id: i64,
        owner_id: i64,
        repos: &[(i64, &str)],
    ) -> Result<()> {
        self.installations()
            .create(NewInstallation {
                installation_id,
                owner_id,
                authorized_repos: repos
                    .iter()
                    .map(|(id, full_name)| AuthorizedRepo {
                        id: *id,
                        full_name: full_name.to_string(),
                    })
                    .collect(),
            })
            .await?;
        Ok(())
    }

    /// Register a user with the given devices and subscriptions.
    pub async fn seed_user(
        &self,
        github_id: i64,
        devices: &[&str],
        allowed: &[EventType],
    ) -> Result<Recipient> {
        let recipients = self.recipients();
        let mut recipient = recipients
            .create(
                github_id,
                devices[0].to_string(),
                allowed.iter().copied().collect(),
            )
            .await?;
        if devices.len() > 1 {
            recipient.replace_device_handles(devices.iter().map(|d| d.to_string()).collect());
            recipients.save(&recipient).await?;
        }
        Ok(recipient)
    }
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/webhooks")
        .join(name)
}

pub fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"))
}

/// Build a webhook delivery request for the given event kind.
pub fn webhook_request(kind: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-github-event", kind)
        .header("x-github-delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958")
        .body(Body::from(body.into()))
        .unwrap()
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
