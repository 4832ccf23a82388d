//! Shared application state handed to every handler.

use std::sync::Arc;

use chaintrain_registry::Registry;

use crate::config::AppConfig;

/// Cloned into each request; both fields are reference-counted.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(registry: Registry, config: AppConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }
}
