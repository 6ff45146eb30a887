//! Directions client error types.

use crate::domain::ErrorKind;

/// Errors from the directions HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum DirectionsError {
    /// HTTP request failed (network error, connection reset, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The lookup did not finish within its time cap
    #[error("directions lookup timed out")]
    Timeout,

    /// JSON deserialization failed
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    /// API returned an error status code or an unrecognised status field
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the API
    #[error("rate limited by directions API")]
    RateLimited,

    /// Invalid API key or unauthorized
    #[error("unauthorized (invalid API key)")]
    Unauthorized,
}

impl DirectionsError {
    /// Classify this error. Only malformed bodies are parse errors; every
    /// other failure is worth retrying on the next natural cycle.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectionsError::Json { .. } => ErrorKind::Parse,
            _ => ErrorKind::Transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DirectionsError::Timeout;
        assert_eq!(err.to_string(), "directions lookup timed out");

        let err = DirectionsError::Api {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "API error 500: Internal Server Error");

        let err = DirectionsError::Json {
            message: "expected string".into(),
            body: Some("{}".into()),
        };
        assert!(err.to_string().contains("JSON parse error"));
        assert!(err.to_string().contains("expected string"));
    }

    #[test]
    fn kinds() {
        assert_eq!(DirectionsError::Timeout.kind(), ErrorKind::Transient);
        assert_eq!(DirectionsError::RateLimited.kind(), ErrorKind::Transient);
        assert_eq!(DirectionsError::Unauthorized.kind(), ErrorKind::Transient);
        let err = DirectionsError::Json {
            message: "eof".into(),
            body: None,
        };
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
