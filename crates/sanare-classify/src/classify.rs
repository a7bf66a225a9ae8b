//! The classification function.

use crate::dashboards::{self, NO_DASHBOARD};
use crate::patterns::{DEFAULT_SPECIALTY, EXCLUSIONS, INCLUSIONS, SPECIALTY_MARKER};
use serde::{Deserialize, Serialize};

/// Whether the classified person may legally practice human medicine here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegalStatus {
    /// Licensed for human medicine
    Legal,
    /// Excluded or unrecognized profession
    Illegal,
}

/// The access decision derived from raw registry text.
///
/// Recomputed on demand from its input; never stored apart from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionClassification {
    /// Whether the profession admits the holder to the platform
    pub valid_professional: bool,
    /// Raw profession text as the registry printed it
    pub profession: String,
    /// Specialty, only when the raw field carried an explicit marker
    pub specialty: Option<String>,
    /// Legal practice status
    pub legal_status: LegalStatus,
    /// Dashboard the account lands on, or "none"
    pub primary_dashboard: String,
    /// Dashboards the account may open
    pub allowed_dashboards: Vec<String>,
    /// Whether an admin must sign off before first login
    pub requires_approval: bool,
}

impl ProfessionClassification {
    fn invalid(raw_profession: &str) -> Self {
        Self {
            valid_professional: false,
            profession: raw_profession.to_string(),
            specialty: None,
            legal_status: LegalStatus::Illegal,
            primary_dashboard: NO_DASHBOARD.to_string(),
            allowed_dashboards: Vec::new(),
            requires_approval: false,
        }
    }
}

/// Classify raw registry profession and specialty text.
///
/// Deterministic and free of I/O. Evaluation order:
///
/// 1. Exclusion patterns. Any hit ends classification as invalid,
///    regardless of what else the text contains.
/// 2. Inclusion patterns. No hit means unknown, treated as invalid.
/// 3. Specialty: accepted only when the raw field carries an explicit
///    "ESPECIALISTA EN ..." marker, otherwise the generic default.
/// 4. Dashboard routing from the static table.
#[must_use]
pub fn classify(raw_profession: &str, raw_specialty: Option<&str>) -> ProfessionClassification {
    let profession_upper = raw_profession.trim().to_uppercase();

    if EXCLUSIONS.iter().any(|p| p.regex.is_match(&profession_upper)) {
        return ProfessionClassification::invalid(raw_profession);
    }

    let Some(matched) = INCLUSIONS.iter().find(|p| p.regex.is_match(&profession_upper)) else {
        return ProfessionClassification::invalid(raw_profession);
    };

    let specialty = match raw_specialty.map(|s| s.trim().to_uppercase()) {
        Some(s) if SPECIALTY_MARKER.is_match(&s) => s,
        _ => DEFAULT_SPECIALTY.to_string(),
    };

    match dashboards::lookup(matched.key) {
        Some(entry) => ProfessionClassification {
            valid_professional: true,
            profession: raw_profession.to_string(),
            specialty: Some(specialty),
            legal_status: LegalStatus::Legal,
            primary_dashboard: entry.primary.to_string(),
            allowed_dashboards: entry.allowed.iter().map(ToString::to_string).collect(),
            requires_approval: entry.requires_approval,
        },
        // An inclusion key missing from the table denies access rather than
        // guessing a dashboard.
        None => ProfessionClassification::invalid(raw_profession),
    }
}
