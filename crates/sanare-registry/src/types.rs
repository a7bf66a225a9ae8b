//! Registry lookup result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a registry lookup established, as a closed set of outcomes.
///
/// Callers must handle all three cases; there is no "maybe found" shape
/// with optional fields to misread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegistryOutcome {
    /// The registry returned a license record
    Found(LicenseRecord),
    /// The registry answered and has no record for the document
    NotFound,
    /// The lookup could not be completed; `reason` is diagnostic only
    Error {
        /// Why the lookup degraded (timeout, unreachable, unparseable page)
        reason: String,
    },
}

/// A license record as printed by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Professional's full name
    pub holder_name: String,
    /// Raw profession text
    pub profession: String,
    /// Raw specialty text, present only when the registry lists one
    pub specialty: Option<String>,
    /// Registry license number
    pub license_number: Option<String>,
    /// Registration date as printed
    pub registration_date: Option<String>,
}

/// A completed lookup with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseVerificationResult {
    /// Normalized document number the lookup was keyed by
    pub document_number: String,
    /// What the lookup established
    pub outcome: RegistryOutcome,
    /// Whether this came from the cache rather than a fresh scrape
    pub cached: bool,
    /// Which registry produced the result
    pub source: String,
    /// When the underlying scrape ran
    pub fetched_at: DateTime<Utc>,
    /// How long the underlying scrape took
    pub processing_time_ms: i64,
}

impl LicenseVerificationResult {
    /// The record, when the outcome was `Found`.
    #[must_use]
    pub fn record(&self) -> Option<&LicenseRecord> {
        match &self.outcome {
            RegistryOutcome::Found(record) => Some(record),
            _ => None,
        }
    }

    /// Whether the registry positively confirmed a license.
    #[must_use]
    pub fn found(&self) -> bool {
        matches!(self.outcome, RegistryOutcome::Found(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let json = serde_json::to_value(&RegistryOutcome::NotFound).expect("serialize");
        assert_eq!(json["outcome"], "not_found");

        let json = serde_json::to_value(&RegistryOutcome::Error {
            reason: "registry unreachable".into(),
        })
        .expect("serialize");
        assert_eq!(json["outcome"], "error");
        assert_eq!(json["reason"], "registry unreachable");
    }

    #[test]
    fn test_record_accessor() {
        let result = LicenseVerificationResult {
            document_number: "12345678-9".into(),
            outcome: RegistryOutcome::NotFound,
            cached: false,
            source: "national-registry".into(),
            fetched_at: Utc::now(),
            processing_time_ms: 10,
        };
        assert!(result.record().is_none());
        assert!(!result.found());
    }
}
