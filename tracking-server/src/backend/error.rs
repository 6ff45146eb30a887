//! Backend client error types.

use crate::domain::ErrorKind;
use crate::tracking::LocationError;

/// Errors from the shipment backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend request timed out")]
    Timeout,

    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    #[error("backend error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("shipment not found: {0}")]
    NotFound(String),

    /// The token was rejected or lacks access to this shipment
    #[error("unauthorized")]
    Unauthorized,
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Json { .. } => ErrorKind::Parse,
            BackendError::Unauthorized => ErrorKind::PermissionDenied,
            _ => ErrorKind::Transient,
        }
    }
}

impl From<BackendError> for LocationError {
    fn from(err: BackendError) -> Self {
        match err.kind() {
            ErrorKind::PermissionDenied => LocationError::PermissionDenied,
            ErrorKind::Parse => LocationError::Parse(err.to_string()),
            ErrorKind::Transient => LocationError::Transient(err.to_string()),
        }
    }
}
