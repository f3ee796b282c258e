//! Error types for linkstash-core

use thiserror::Error;

/// Result type alias using linkstash-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in linkstash-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote store rejected or failed an operation
    #[error("Remote store error: {0}")]
    Remote(String),

    /// No authenticated identity is available for this pass
    #[error("No authenticated identity")]
    NoIdentity,

    /// Session could not be refreshed
    #[error("Authentication error: {0}")]
    Auth(#[from] crate::auth::AuthError),
}

impl Error {
    /// Whether this error aborts a whole reconciliation pass rather than a
    /// single entity.
    pub const fn is_pass_level(&self) -> bool {
        matches!(self, Self::NoIdentity | Self::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_errors_are_pass_level() {
        assert!(Error::NoIdentity.is_pass_level());
        assert!(!Error::Remote("timeout".to_string()).is_pass_level());
    }
}
