//! Sanare registration verification service.

mod error;
mod routes;
mod state;
mod telemetry;

use sanare_core::config::AppConfig;
use sanare_core::error::{Result, SanareError};
use sanare_kyc::KycClient;
use state::AppState;
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    let config = AppConfig::load_with_env()?;

    let db = sanare_db::Database::new(&config.database.path, config.database.max_connections)
        .await
        .map_err(SanareError::from)?;
    db.run_migrations().await.map_err(SanareError::from)?;
    let pool = db.pool().clone();

    let provider = Arc::new(KycClient::new(&config.kyc).map_err(SanareError::from)?);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(pool.clone(), config, provider);

    spawn_sweeper(pool);

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "registration verification service ready");

    axum::serve(listener, app)
        .await
        .map_err(|e| SanareError::Internal(format!("server error: {e}")))?;
    Ok(())
}

/// Periodic housekeeping: expire stale drafts, prune old rate windows.
fn spawn_sweeper(pool: sqlx::Pool<sqlx::Sqlite>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = sanare_verify::drafts::expire_stale_drafts(&pool).await {
                tracing::warn!("draft expiry sweep failed: {e}");
            }
            if let Err(e) = sanare_db::rate_limits::prune(&pool, 3600).await {
                tracing::warn!("rate limit prune failed: {e}");
            }
        }
    });
}
