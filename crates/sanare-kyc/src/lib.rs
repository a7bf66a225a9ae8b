//! Sanare Identity Verification
//!
//! Client and vocabulary for the third-party KYC provider: session
//! creation, status queries, administrative status updates, and the types
//! shared with webhook ingestion. The [`IdentityProvider`] trait is the
//! seam tests mock.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod error;
pub mod provider;
pub mod types;

pub use client::KycClient;
pub use error::{KycError, Result};
pub use provider::IdentityProvider;
pub use types::{
    ContactDetails, CreateSessionRequest, CreatedSession, DecisionBundle, SessionSnapshot,
    SessionStatus, SubCheck, WebhookPayload,
};
