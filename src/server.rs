//! # Server Configuration
//!
//! Router assembly, shared application state and the HTTP listener.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::dispatch::Dispatcher;
use crate::handlers;
use crate::push::PushClient;
use crate::repositories::{InstallationRepository, UserRepository};
use crate::telemetry::trace_context_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub push: Arc<dyn PushClient>,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection, push: Arc<dyn PushClient>) -> Self {
        Self {
            config: Arc::new(config),
            db,
            push,
        }
    }

    pub fn installations(&self) -> InstallationRepository {
        InstallationRepository::new(self.db.clone())
    }

    pub fn recipients(&self) -> UserRepository {
        UserRepository::new(self.db.clone())
    }

    /// Dispatcher over the database-backed stores and the configured push client.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::new(self.installations()),
            Arc::new(self.recipients()),
            Arc::clone(&self.push),
        )
        .with_policy(self.config.fanout_policy)
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let webhook_body_limit = state.config.webhook_max_body_bytes();

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route(
            "/webhook",
            post(handlers::webhooks::receive_webhook)
                .layer(DefaultBodyLimit::max(webhook_body_limit)),
        )
        .route(
            "/users",
            post(handlers::users::register_user)
                .get(handlers::users::get_user)
                .patch(handlers::users::update_user),
        )
        .route(
            "/authorized_repos",
            get(handlers::authorized_repos::list_authorized_repos),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_context_middleware))
}

/// Starts the server and serves until interrupted.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let addr = state
        .config
        .bind_addr()
        .context("Invalid server address")?;
    let profile = state.config.profile.clone();

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::webhooks::receive_webhook,
        crate::handlers::users::register_user,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::authorized_repos::list_authorized_repos,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::AuthorizedRepo,
            crate::events::Event,
            crate::events::EventType,
            crate::error::ApiError,
            crate::handlers::HealthResponse,
            crate::handlers::webhooks::WebhookAckResponse,
            crate::handlers::users::RegisterUserRequest,
            crate::handlers::users::UpdateUserRequest,
            crate::handlers::users::UserResponse,
        )
    ),
    tags(
        (name = "root", description = "Service information"),
        (name = "webhooks", description = "GitHub App webhook intake"),
        (name = "users", description = "Push recipient registration"),
    ),
    info(
        title = "Push Request API",
        description = "Turns GitHub App webhooks into background push notifications",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
