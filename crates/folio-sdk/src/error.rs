//! Error types for the Folio SDK

use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types
///
/// Payloads are strings so one failed fetch can be cloned out to every
/// waiter attached to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// Session, sign-in or sign-out failure
    #[error("Auth error: {0}")]
    Auth(String),

    /// Remote fetch failed (profile, projects, documents, literature)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Local I/O failure (content materialization)
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SdkError {
    /// Whether this error belongs to the auth family
    pub fn is_auth(&self) -> bool {
        matches!(self, SdkError::Auth(_))
    }
}

impl From<folio_client::ClientError> for SdkError {
    fn from(err: folio_client::ClientError) -> Self {
        match err {
            folio_client::ClientError::NotFound(what) => SdkError::NotFound(what),
            folio_client::ClientError::Json(e) => SdkError::Serialization(e.to_string()),
            folio_client::ClientError::Config(msg) => SdkError::Config(msg),
            folio_client::ClientError::Unauthenticated => SdkError::Auth("not authenticated".into()),
            other => SdkError::Fetch(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SdkError {
    fn from(err: std::io::Error) -> Self {
        SdkError::Io(err.to_string())
    }
}
