use sanare_core::error::{ConfigError, SanareError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MailError>;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail configuration error: {0}")]
    Config(String),

    #[error("invalid recipient: {0}")]
    BadRecipient(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

impl From<MailError> for SanareError {
    fn from(e: MailError) -> Self {
        match e {
            MailError::Config(reason) => Self::Config(ConfigError::InvalidValue {
                field: "mail".to_string(),
                reason,
            }),
            MailError::BadRecipient(reason) => Self::validation("email", reason),
            MailError::Build(_) | MailError::Transport(_) => {
                Self::upstream("smtp", e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_maps_to_upstream() {
        let err: SanareError = MailError::Transport("connection refused".to_string()).into();
        assert!(matches!(err, SanareError::Upstream { .. }));
    }

    #[test]
    fn test_bad_recipient_maps_to_validation() {
        let err: SanareError = MailError::BadRecipient("no at sign".to_string()).into();
        assert!(matches!(err, SanareError::Validation { .. }));
    }
}
