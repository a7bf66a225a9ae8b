//! Provider session vocabulary.
//!
//! Status strings follow the provider's wire format exactly ("In Review",
//! with a space). The database stores them verbatim; this module is the
//! one place that interprets them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity verification session status, provider vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Session created, user has not begun
    #[serde(rename = "Not Started")]
    NotStarted,
    /// User is working through the checks
    #[serde(rename = "In Progress")]
    InProgress,
    /// Automated checks finished, manual review pending
    #[serde(rename = "In Review")]
    InReview,
    /// Terminal: identity verified
    #[serde(rename = "Approved")]
    Approved,
    /// Terminal: identity rejected
    #[serde(rename = "Declined")]
    Declined,
    /// User walked away; a new attempt may resume or restart
    #[serde(rename = "Abandoned")]
    Abandoned,
    /// Terminal: session aged out at the provider
    #[serde(rename = "Expired")]
    Expired,
}

impl SessionStatus {
    /// Wire string as the provider sends it.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::InReview => "In Review",
            Self::Approved => "Approved",
            Self::Declined => "Declined",
            Self::Abandoned => "Abandoned",
            Self::Expired => "Expired",
        }
    }

    /// Parse a wire string; unknown strings yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Not Started" => Some(Self::NotStarted),
            "In Progress" => Some(Self::InProgress),
            "In Review" => Some(Self::InReview),
            "Approved" => Some(Self::Approved),
            "Declined" => Some(Self::Declined),
            "Abandoned" => Some(Self::Abandoned),
            "Expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Whether this status must never be overwritten once stored.
    ///
    /// Abandoned is deliberately not terminal; the user can come back.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Declined | Self::Expired)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One sub-check inside a decision bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCheck {
    /// Sub-check status, same vocabulary as the session status
    pub status: String,
}

impl SubCheck {
    /// Whether this sub-check individually passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == "Approved"
    }
}

/// The provider's full decision for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionBundle {
    /// Identity document authenticity check
    pub id_verification: Option<SubCheck>,
    /// Selfie-to-document face match
    pub face_match: Option<SubCheck>,
    /// Liveness detection
    pub liveness: Option<SubCheck>,
    /// Anti-fraud / anti-money-laundering screening
    pub aml: Option<SubCheck>,
}

impl DecisionBundle {
    /// Whether every sub-check is present and individually approved.
    ///
    /// A missing sub-check counts as not passing. A top-level Approved
    /// with an incomplete bundle is a discrepancy, not a pass.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        [
            &self.id_verification,
            &self.face_match,
            &self.liveness,
            &self.aml,
        ]
        .iter()
        .all(|check| check.as_ref().is_some_and(SubCheck::passed))
    }

    /// Names of sub-checks that are missing or not approved.
    #[must_use]
    pub fn failing_checks(&self) -> Vec<&'static str> {
        let mut failing = Vec::new();
        for (name, check) in [
            ("id_verification", &self.id_verification),
            ("face_match", &self.face_match),
            ("liveness", &self.liveness),
            ("aml", &self.aml),
        ] {
            if !check.as_ref().is_some_and(SubCheck::passed) {
                failing.push(name);
            }
        }
        failing
    }
}

/// Request body for creating a session.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    /// Provider workflow to run
    pub workflow_id: String,
    /// Correlation value echoed back in webhooks (the verification token)
    pub vendor_data: String,
    /// Where the provider redirects the user afterwards
    pub callback: String,
    /// Contact email for the person being verified
    pub contact_details: ContactDetails,
    /// Free-form metadata stored with the session
    pub metadata: serde_json::Value,
}

/// Contact details passed to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct ContactDetails {
    /// Email of the person being verified
    pub email: String,
}

/// Provider response to session creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSession {
    /// Provider-assigned session id
    pub session_id: String,
    /// URL the user opens to run the checks
    pub url: String,
    /// Initial status
    pub status: SessionStatus,
}

/// Provider response to a status query.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSnapshot {
    /// Session id
    pub session_id: String,
    /// Current status
    pub status: SessionStatus,
    /// Decision bundle, present once checks have run
    #[serde(default)]
    pub decision: Option<DecisionBundle>,
    /// Correlation value from session creation
    #[serde(default)]
    pub vendor_data: Option<String>,
}

/// Inbound webhook body pushed by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Session the notification concerns
    pub session_id: String,
    /// Reported status string, kept raw until interpreted
    pub status: String,
    /// Workflow id, when the provider includes it
    #[serde(default)]
    pub workflow_id: Option<String>,
    /// Correlation value from session creation
    #[serde(default)]
    pub vendor_data: Option<String>,
    /// Decision bundle, when the provider includes it
    #[serde(default)]
    pub decision: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_strings_round_trip() {
        for status in [
            SessionStatus::NotStarted,
            SessionStatus::InProgress,
            SessionStatus::InReview,
            SessionStatus::Approved,
            SessionStatus::Declined,
            SessionStatus::Abandoned,
            SessionStatus::Expired,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("approved"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(SessionStatus::Approved.is_terminal());
        assert!(SessionStatus::Declined.is_terminal());
        assert!(SessionStatus::Expired.is_terminal());
        assert!(!SessionStatus::Abandoned.is_terminal());
        assert!(!SessionStatus::InReview.is_terminal());
    }

    #[test]
    fn test_decision_requires_every_subcheck() {
        let approved = || {
            Some(SubCheck {
                status: "Approved".to_string(),
            })
        };
        let full = DecisionBundle {
            id_verification: approved(),
            face_match: approved(),
            liveness: approved(),
            aml: approved(),
        };
        assert!(full.all_passed());
        assert!(full.failing_checks().is_empty());

        let missing_aml = DecisionBundle {
            aml: None,
            ..full.clone()
        };
        assert!(!missing_aml.all_passed());
        assert_eq!(missing_aml.failing_checks(), vec!["aml"]);

        let failed_face = DecisionBundle {
            face_match: Some(SubCheck {
                status: "Declined".to_string(),
            }),
            ..full
        };
        assert_eq!(failed_face.failing_checks(), vec!["face_match"]);
    }

    #[test]
    fn test_webhook_payload_deserializes_with_minimal_fields() {
        let payload: WebhookPayload =
            serde_json::from_str(r#"{"session_id": "S1", "status": "In Progress"}"#)
                .expect("deserialize");
        assert_eq!(payload.session_id, "S1");
        assert!(payload.decision.is_none());
    }

    #[test]
    fn test_status_serializes_with_spaces() {
        let json = serde_json::to_string(&SessionStatus::InReview).expect("serialize");
        assert_eq!(json, r#""In Review""#);
    }
}
