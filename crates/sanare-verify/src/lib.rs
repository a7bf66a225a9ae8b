//! Sanare Verification Pipeline
//!
//! Orchestrates the credential verification steps over persisted state:
//! email codes, the registry license check with classification, identity
//! verification sessions, webhook reconciliation, and the completion gate
//! that turns a fully verified draft into a permanent account.
//!
//! All cross-step coordination goes through the database so the pipeline
//! survives a crash between steps and runs correctly across multiple
//! server instances.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod completion;
pub mod drafts;
pub mod license;
pub mod sessions;
pub mod webhook;

pub use completion::{CompletedRegistration, Readiness};
pub use drafts::IssuedCode;
pub use license::LicenseCheck;

#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::Pool<sqlx::Sqlite> {
    let pool = sanare_db::connection::connect(":memory:", 1)
        .await
        .expect("open in-memory database");
    sanare_db::migrations::run_migrations(&pool)
        .await
        .expect("run migrations");
    pool
}
