//! Sanare core: shared types, errors and configuration.
//!
//! Every other crate in the workspace depends on this one for the central
//! error taxonomy, validated domain newtypes, and the TOML application
//! config.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{ConfigError, Result, SanareError};
pub use types::{DocumentNumber, DocumentType, EmailAddress, VerificationToken};
