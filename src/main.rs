mod backend;
mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod revalidate;
mod services;

#[cfg(test)]
mod testing;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::backend::Backend;
use crate::config::Config;
use crate::revalidate::Revalidator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Backend,
    pub revalidator: Revalidator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudstash=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cloudstash...");

    let config = Arc::new(Config::load()?);
    tracing::info!("Configuration loaded");

    let backend = Backend::connect(&config).await?;
    tracing::info!(
        "Backend ready, blobs in {} storage",
        backend.admin_client().storage.storage_type()
    );

    let state = AppState {
        config: config.clone(),
        backend,
        revalidator: Revalidator::new(),
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/auth/sign-up", post(handlers::auth::sign_up))
        .route("/auth/sign-in", post(handlers::auth::sign_in))
        .route("/auth/otp", post(handlers::auth::send_otp))
        .route("/auth/verify", post(handlers::auth::verify))
        .route("/auth/sign-out", post(handlers::auth::sign_out))
        .route("/user/me", get(handlers::user::me))
        .route("/events", get(handlers::events::revalidation_events));

    let upload_limit =
        usize::try_from(state.config.upload.max_request_size).unwrap_or(usize::MAX);

    // Session routes
    let session_routes = Router::new()
        .route("/files", get(handlers::file::list_files))
        .route(
            "/files/upload",
            post(handlers::file::upload_files).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/usage", get(handlers::file::usage))
        .route(
            "/files/:id",
            patch(handlers::file::rename_file).delete(handlers::file::delete_file),
        )
        .route("/files/:id/users", put(handlers::file::update_file_users))
        .route("/files/:id/actions", post(handlers::file::file_action))
        .route("/blobs/:id/view", get(handlers::blobs::view_blob))
        .route("/blobs/:id/download", get(handlers::blobs::download_blob))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session::require_session,
        ));

    Router::new()
        .nest("/api/v1", public_routes.merge(session_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
