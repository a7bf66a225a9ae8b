//! Sanare Profession Classifier
//!
//! Turns raw registry profession/specialty text into an access decision:
//! whether the holder may practice, which specialty applies, and which
//! dashboards the resulting account gets.
//!
//! The classifier is a pure function over two ordered pattern tables.
//! Exclusions always run before inclusions because excluded professions can
//! contain generic medical tokens in their registry spelling.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod dashboards;
pub mod patterns;

pub use classify::{classify, LegalStatus, ProfessionClassification};
