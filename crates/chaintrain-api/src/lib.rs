//! # chaintrain-api — HTTP Surface of the ChainTrain Registry
//!
//! Serves the dashboard: dataset registration and download, training and
//! verification, and read access to the catalog.
//!
//! ## API Surface
//!
//! | Path                          | Module                 |
//! |-------------------------------|------------------------|
//! | `/upload-dataset`             | [`routes::datasets`]   |
//! | `/download-dataset`           | [`routes::datasets`]   |
//! | `/api/train`, `/api/verify`, `/api/training-history` | [`routes::training`] |
//! | `/api/datasets/*`, `/api/models/*`, `/api/proofs/*` | [`routes::catalog`] |
//! | `/api/lineage`, `/api/governance`, `/api/uploads/*` | [`routes::catalog`] |
//! | `/metrics`                    | [`middleware::metrics`] |
//! | `/openapi.json`               | [`openapi`]            |
//! | `/health/liveness`, `/health/readiness` | unauthenticated |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! CorsLayer → TraceLayer → MetricsMiddleware → AuthMiddleware → BodyLimit → Handler
//! ```

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::{header, HeaderValue};
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::bootstrap::BootstrapError;
use crate::config::AppConfig;
use crate::middleware::metrics::{ApiMetrics, MetricsSnapshot};
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();
    let cors = cors_layer(&state.config.cors_origins);
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    let api = Router::new()
        .merge(routes::datasets::router())
        .merge(routes::training::router())
        .merge(routes::catalog::router())
        .merge(openapi::router())
        .route("/metrics", get(metrics_snapshot))
        .layer(body_limit)
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .layer(Extension(metrics))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new().merge(health).merge(api).layer(cors)
}

/// CORS for the dashboard origins. `Content-Disposition` is exposed so the
/// browser can read download filenames.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([header::CONTENT_DISPOSITION])
}

/// GET /metrics — Request counters.
async fn metrics_snapshot(Extension(metrics): Extension<ApiMetrics>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

/// Liveness probe. Always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. Returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}

/// Server startup or runtime failure.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("server I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Bootstrap state from `config` and serve until the process is stopped.
pub async fn serve(config: AppConfig) -> Result<(), ServeError> {
    let addr = SocketAddr::new(config.bind_addr, config.port);
    let state = bootstrap::bootstrap(config).await?;
    let app = app(state);

    tracing::info!("ChainTrain API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
