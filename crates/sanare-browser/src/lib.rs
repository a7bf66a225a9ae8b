//! Sanare Browser Layer
//!
//! Thin wrapper over `chromiumoxide` providing single-use, isolated browser
//! sessions for scraping the license registry. Every action carries a
//! per-step timeout so a stuck page can never wedge a lookup.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod session;

pub use error::{BrowserError, Result};
pub use session::BrowserSession;
