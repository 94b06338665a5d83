//! # Push Request Main Entry Point

use std::sync::Arc;

use anyhow::{Context, bail};
use push_request::{
    config::ConfigLoader,
    db,
    push::{ApnsClient, LoggingPushClient, PushClient},
    server::{AppState, run_server},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from layered env files and variables
    let config = ConfigLoader::new()
        .load()
        .context("Failed to load configuration")?;

    telemetry::init_tracing(&config).context("Failed to initialize tracing")?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = db::init_pool(&config).await?;
    db::run_migrations(&db).await?;

    let push: Arc<dyn PushClient> = if config.apns.is_configured() {
        let client = ApnsClient::from_config(&config.apns).context("Invalid APNs configuration")?;
        tracing::info!(endpoint = client.endpoint(), "APNs push client ready");
        Arc::new(client)
    } else if config.is_local_profile() {
        tracing::warn!("APNs credentials missing; push notifications will only be logged");
        Arc::new(LoggingPushClient)
    } else {
        bail!("APNs credentials are required for profile '{}'", config.profile);
    };

    run_server(AppState::new(config, db, push)).await
}
