//! Database connection management.
//!
//! Wraps a `SQLx` SQLite pool with creation options suitable for a small
//! multi-instance service: WAL journaling and busy-timeout so concurrent
//! webhook deliveries don't trip over each other.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

/// Create a connection pool for the given database path.
///
/// # Arguments
/// * `path` - Path to the `SQLite` database file (or `:memory:`)
/// * `max_connections` - Pool size
///
/// # Errors
/// Returns `DatabaseError::Open` if the path is invalid or the database
/// cannot be opened.
pub async fn connect(path: &str, max_connections: u32) -> Result<Pool<Sqlite>> {
    let connect_options = SqliteConnectOptions::from_str(path)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .pragma("journal_mode", "WAL")
        .pragma("foreign_keys", "ON");

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to initialize pool: {e}")))?;

    tracing::info!("Database pool created at {}", path);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let pool = connect(":memory:", 5).await.expect("create pool");
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .expect("probe query");
    }

    #[tokio::test]
    async fn test_connect_invalid_path() {
        let result = connect("/no/such/dir\0/x.db", 1).await;
        assert!(result.is_err());
    }
}
