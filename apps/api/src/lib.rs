//! # medtrack-api: HTTP JSON API for MedTrack
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Request                                                                │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  TraceLayer ──► CorsLayer ──► Router                                    │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │  AuthUser extractor (cookie / bearer → user + grants)                  │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │  handler: permission gate → validate → repository → activity log       │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │  Json<T> or ApiError {code, message}                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;


use auth::JwtManager;
use config::ApiConfig;
use medtrack_db::{Database, DbConfig};

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub jwt: JwtManager,
    pub config: ApiConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> SharedState {
        let jwt = JwtManager::new(&config.jwt_secret, config.session_max_minutes);
        Arc::new(AppState { db, jwt, config })
    }
}

/// Builds the full router with middleware.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(routes::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// Opens the database and serves until Ctrl+C or SIGTERM.
pub async fn start_server(config: ApiConfig) -> anyhow::Result<()> {
    info!(path = %config.database_path, "Opening database...");
    let db = Database::new(DbConfig::new(&config.database_path).max_connections(config.max_connections)).await?;

    if config.uses_dev_secret() {
        warn!("Using the development JWT secret; set MEDTRACK_JWT_SECRET in production");
    }

    let address = config.bind_address();
    let state = AppState::new(db.clone(), config);
    let app = build_router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
