use sanare_core::error::{ConfigError, SanareError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KycError>;

/// Failures talking to the identity verification provider.
///
/// Configuration, upstream HTTP, network and parse failures are distinct
/// so callers can tell a broken deployment from a flaky provider. A 404
/// gets its own variant because it means "prompt the user to re-verify",
/// not "retry".
#[derive(Debug, Error)]
pub enum KycError {
    #[error("provider configuration error: {0}")]
    Config(String),

    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error reaching provider: {0}")]
    Network(String),

    #[error("unparseable provider response: {0}")]
    Parse(String),

    #[error("session {0} not found or expired at provider")]
    SessionNotFound(String),
}

impl From<reqwest::Error> for KycError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<KycError> for SanareError {
    fn from(e: KycError) -> Self {
        match e {
            KycError::Config(reason) => Self::Config(ConfigError::InvalidValue {
                field: "kyc".to_string(),
                reason,
            }),
            KycError::SessionNotFound(id) => {
                Self::NotFound(format!("identity session {id} not found or expired"))
            }
            KycError::Api { .. } | KycError::Network(_) | KycError::Parse(_) => {
                Self::upstream("kyc-provider", e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_not_found_maps_to_not_found() {
        let err: SanareError = KycError::SessionNotFound("S1".to_string()).into();
        assert!(matches!(err, SanareError::NotFound(_)));
    }

    #[test]
    fn test_api_failure_maps_to_upstream() {
        let err: SanareError = KycError::Api {
            status: 503,
            message: "maintenance".to_string(),
        }
        .into();
        assert!(matches!(err, SanareError::Upstream { .. }));
    }
}
