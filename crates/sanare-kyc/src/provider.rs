//! The provider seam.
//!
//! Everything above the wire goes through [`IdentityProvider`] so the
//! webhook and completion logic can be exercised against a scripted
//! provider in tests.

use crate::error::Result;
use crate::types::{CreateSessionRequest, CreatedSession, SessionSnapshot, SessionStatus};
use async_trait::async_trait;

/// Operations the identity verification vendor exposes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a new verification session.
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<CreatedSession>;

    /// Fetch the current status and decision bundle for a session.
    ///
    /// A provider 404 surfaces as [`crate::KycError::SessionNotFound`],
    /// not a generic upstream failure.
    async fn get_status(&self, session_id: &str) -> Result<SessionSnapshot>;

    /// Administratively set a session's status at the provider.
    async fn update_status(
        &self,
        session_id: &str,
        new_status: SessionStatus,
        comment: &str,
    ) -> Result<()>;
}
