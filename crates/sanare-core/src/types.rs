//! Shared types used across the Sanare application.
//!
//! This module defines common newtypes that provide type safety and clear
//! domain modeling for the verification pipeline.

use crate::error::SanareError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("valid regex")
});

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

/// Newtype for registration-draft verification tokens.
///
/// Tokens are opaque, unguessable UUID v4 strings. Every in-flight
/// registration is keyed by one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationToken(String);

impl VerificationToken {
    /// Create a `VerificationToken` from a string.
    ///
    /// # Errors
    /// Returns error if the token is not a valid UUID v4.
    pub fn new(token: impl Into<String>) -> Result<Self, SanareError> {
        let token = token.into();
        if UUID_REGEX.is_match(&token) {
            Ok(Self(token))
        } else {
            Err(SanareError::validation(
                "verification_token",
                "must be a valid UUID v4",
            ))
        }
    }

    /// Generate a new random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A national professional document number, normalized for lookups.
///
/// The registry keys professionals by their run-style document number.
/// Normalization strips formatting dots, whitespace and the common
/// "RUN"/"RUT" prefixes so that `"RUN 12.345.678-9"` and `"12345678-9"`
/// address the same cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentNumber(String);

impl DocumentNumber {
    /// Normalize and validate a raw document number.
    ///
    /// # Errors
    /// Returns error if nothing resembling a document number remains after
    /// normalization.
    pub fn normalize(raw: &str) -> Result<Self, SanareError> {
        let mut s = raw.trim().to_uppercase();
        for prefix in ["RUN", "RUT", "N°", "NO.", "#"] {
            if let Some(rest) = s.strip_prefix(prefix) {
                s = rest.trim_start().to_string();
            }
        }
        let cleaned: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();

        if cleaned.len() < 2 || !cleaned.chars().any(|c| c.is_ascii_digit()) {
            return Err(SanareError::validation(
                "document_number",
                format!("'{raw}' does not contain a usable document number"),
            ));
        }
        Ok(Self(cleaned))
    }

    /// Get the normalized string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated email address newtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create an `EmailAddress`, lowercasing and validating the input.
    ///
    /// # Errors
    /// Returns error if the value does not look like an email address.
    pub fn new(email: impl Into<String>) -> Result<Self, SanareError> {
        let email = email.into().trim().to_lowercase();
        if EMAIL_REGEX.is_match(&email) {
            Ok(Self(email))
        } else {
            Err(SanareError::validation(
                "email",
                "not a valid email address",
            ))
        }
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document types accepted by the registry search form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// National identity number (RUN)
    Run,
    /// Foreign passport number
    Passport,
}

impl DocumentType {
    /// Stable string form used in the database and API payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Passport => "passport",
        }
    }

    /// Parse from the stable string form.
    pub fn parse(s: &str) -> Result<Self, SanareError> {
        match s {
            "run" => Ok(Self::Run),
            "passport" => Ok(Self::Passport),
            other => Err(SanareError::validation(
                "document_type",
                format!("unknown document type '{other}'"),
            )),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generate_and_roundtrip() {
        let token = VerificationToken::generate();
        let parsed = VerificationToken::new(token.as_str()).expect("valid generated token");
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_token_rejects_garbage() {
        for bad in ["", "not-a-uuid", "550e8400-e29b-51d4-a716-446655440000"] {
            assert!(VerificationToken::new(bad).is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn test_document_number_normalization() {
        let cases = [
            ("12.345.678-9", "12345678-9"),
            ("RUN 12.345.678-9", "12345678-9"),
            ("rut 7654321-K", "7654321-K"),
            ("  12345678-9 ", "12345678-9"),
        ];
        for (raw, expected) in cases {
            let doc = DocumentNumber::normalize(raw).expect("normalize");
            assert_eq!(doc.as_str(), expected, "raw: {raw}");
        }
    }

    #[test]
    fn test_document_number_rejects_empty() {
        assert!(DocumentNumber::normalize("").is_err());
        assert!(DocumentNumber::normalize("RUN").is_err());
        assert!(DocumentNumber::normalize("---").is_err());
    }

    #[test]
    fn test_email_address() {
        let email = EmailAddress::new(" Dr.House@Example.COM ").expect("valid email");
        assert_eq!(email.as_str(), "dr.house@example.com");
        assert!(EmailAddress::new("nope").is_err());
        assert!(EmailAddress::new("a@b").is_err());
    }

    #[test]
    fn test_document_type_parse() {
        assert_eq!(DocumentType::parse("run").unwrap(), DocumentType::Run);
        assert_eq!(
            DocumentType::parse("passport").unwrap(),
            DocumentType::Passport
        );
        assert!(DocumentType::parse("dni").is_err());
    }
}
