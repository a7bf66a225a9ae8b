//! Shared handler state.

use sanare_core::config::AppConfig;
use sanare_kyc::IdentityProvider;
use sanare_registry::RegistryService;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;

/// Everything the request handlers share.
#[derive(Clone)]
pub struct AppState {
    /// Database pool
    pub pool: Pool<Sqlite>,
    /// Full application configuration
    pub config: Arc<AppConfig>,
    /// Registry lookup service with its browser-slot bound
    pub registry: RegistryService,
    /// Identity verification provider client
    pub provider: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Assemble the state from its parts.
    #[must_use]
    pub fn new(
        pool: Pool<Sqlite>,
        config: AppConfig,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let registry = RegistryService::new(pool.clone(), config.registry.clone());
        Self {
            pool,
            config: Arc::new(config),
            registry,
            provider,
        }
    }
}
