//! Sanare Database Layer
//!
//! Provides `SQLite` persistence for the registration verification pipeline.
//! Uses `SQLx` with embedded, versioned migrations.
//!
//! # Architecture
//!
//! - **Drafts**: in-flight registrations keyed by verification token
//! - **License cache**: insert-only registry lookup results with a read TTL
//! - **Identity sessions**: webhook-fed state with a terminal-status guard
//!   enforced inside the upsert SQL itself
//! - **Audit log**: append-only trail of every security-relevant action
//! - **Rate limits**: fixed-window counters shared across server instances
//!
//! # Example
//!
//! ```ignore
//! use sanare_db::Database;
//!
//! let db = Database::new("sanare.db", 5).await?;
//! db.run_migrations().await?;
//! ```
//!
//! # Design Principles
//!
//! - Concurrency control lives in the SQL (guarded upserts, conditional
//!   UPDATEs, partial unique indexes), not in process-level locks
//! - Timestamps are stored as RFC 3339 TEXT in UTC
//! - Migrations run automatically on startup

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod accounts;
pub mod audit;
pub mod connection;
pub mod drafts;
pub mod error;
pub mod identity_sessions;
pub mod license_cache;
pub mod migrations;
pub mod rate_limits;

// Re-export commonly used types
pub use error::{DatabaseError, Result};

/// High-level database handle that bundles connection and migrations.
#[derive(Debug, Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Sqlite>,
}

impl Database {
    /// Open (or create) the database at `path`.
    ///
    /// # Arguments
    /// * `path` - Path to the database file (or `:memory:` for tests)
    /// * `max_connections` - Connection pool size
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the database cannot be opened.
    pub async fn new(path: &str, max_connections: u32) -> Result<Self> {
        let pool = connection::connect(path, max_connections).await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version (number of applied migrations).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Direct access to the underlying pool for the per-table modules.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        &self.pool
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::Pool<sqlx::Sqlite> {
    let pool = connection::connect(":memory:", 1)
        .await
        .expect("open in-memory database");
    migrations::run_migrations(&pool)
        .await
        .expect("run migrations");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_lifecycle() {
        let db = Database::new(":memory:", 1).await.expect("open");
        db.run_migrations().await.expect("migrate");
        assert_eq!(db.get_schema_version().await.expect("version"), 6);
        db.close().await;
    }
}
