//! Sanare Mail
//!
//! Verification-code generation, hashing, and SMTP delivery. Codes are
//! stored only as SHA-256 hashes; plaintext goes out in the email and is
//! then gone.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod codes;
pub mod error;
pub mod sender;
pub mod templates;

pub use codes::{generate_code, hash_code, verify_code};
pub use error::{MailError, Result};
pub use templates::EmailTemplate;
