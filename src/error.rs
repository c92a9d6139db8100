//! Error types for warden.

use thiserror::Error;

/// Infrastructure error type for warden.
///
/// These are failures of the collaborators this core depends on
/// (credential store, revocation cache, mailer) or of its own setup.
/// They never mean "allow"; callers translate them into a closed failure.
#[derive(Error, Debug)]
pub enum WardenError {
    /// Database error.
    ///
    /// Wraps errors from the credential store backend. Errors from sqlx are
    /// automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// Revocation cache error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Outbound mail delivery error.
    #[error("mail error: {0}")]
    Mail(String),

    /// A collaborator call did not complete within its deadline.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Token signing failed.
    #[error("token signing error: {0}")]
    Signing(String),
}

impl From<sqlx::Error> for WardenError {
    fn from(e: sqlx::Error) -> Self {
        WardenError::Database(e.to_string())
    }
}

/// Result type alias for warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_display() {
        let err = WardenError::Database("locked".to_string());
        assert_eq!(err.to_string(), "database error: locked");
    }

    #[test]
    fn test_timeout_error_display() {
        let err = WardenError::Timeout("revocation cache");
        assert_eq!(err.to_string(), "revocation cache timed out");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = WardenError::NotFound("user".to_string());
        assert_eq!(err.to_string(), "user not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WardenError = io_err.into();
        assert!(matches!(err, WardenError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: WardenError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, WardenError::Database(_)));
    }
}
