//! # chaintrain-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the ChainTrain registry.

use chaintrain_api::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;
    tracing::debug!(?config, "configuration loaded");

    chaintrain_api::serve(config).await.map_err(|e| {
        tracing::error!("Server failed: {e}");
        e
    })?;

    Ok(())
}
