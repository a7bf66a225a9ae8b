use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("row not found: {0}")]
    NotFound(String),

    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    #[error("failed to decode stored value: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Whether the underlying sqlx error was a UNIQUE constraint violation.
    #[must_use]
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
    }
}

impl From<DatabaseError> for sanare_core::SanareError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => Self::NotFound(msg),
            DatabaseError::Conflict(msg) => Self::StateConflict(msg),
            other => Self::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DatabaseError::NotFound("draft abc".to_string());
        assert_eq!(err.to_string(), "row not found: draft abc");
    }

    #[test]
    fn test_conversion_to_core_error() {
        let err: sanare_core::SanareError =
            DatabaseError::Conflict("duplicate draft".to_string()).into();
        assert!(matches!(
            err,
            sanare_core::SanareError::StateConflict(_)
        ));
    }
}
