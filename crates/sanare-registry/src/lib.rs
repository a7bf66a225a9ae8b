//! Sanare Registry Scraper
//!
//! Looks up medical licenses in the external government registry, which is
//! reachable only through its web UI. A lookup normalizes the document
//! number, consults the cache, and on a miss drives an isolated headless
//! browser session through the search form.
//!
//! # Guarantees
//!
//! - Every lookup terminates within the configured overall deadline
//! - Scrape failures degrade to [`RegistryOutcome::Error`], never a hang
//!   or a propagated exception
//! - Concurrent lookups never share browser state; a semaphore bounds how
//!   many sessions run at once

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod parser;
pub mod scraper;
pub mod service;
pub mod types;

pub use service::RegistryService;
pub use types::{LicenseRecord, LicenseVerificationResult, RegistryOutcome};
