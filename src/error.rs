//! Error types for talking to the voice backend.

use thiserror::Error;

/// Errors that can occur while calling the dialogue or synthesis endpoints.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Backend answered with a non-success status.
    #[error("Backend returned HTTP {0}")]
    Status(u16),

    /// Backend did not answer within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// Success status, but the body did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl BackendError {
    /// Map a reqwest error, folding its timeout flavour into [`BackendError::Timeout`].
    #[must_use]
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        err.status()
            .map_or_else(|| Self::HttpRequest(err), |status| Self::Status(status.as_u16()))
    }

    /// Check if this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// HTTP status code, when the backend answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Convenience result alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        assert_eq!(BackendError::Status(500).status(), Some(500));
        assert_eq!(BackendError::Timeout.status(), None);
    }

    #[test]
    fn test_timeout_classification() {
        assert!(BackendError::Timeout.is_timeout());
        assert!(!BackendError::Status(504).is_timeout());
        assert!(!BackendError::MalformedResponse("x".to_string()).is_timeout());
    }

    #[test]
    fn test_display() {
        assert_eq!(BackendError::Status(503).to_string(), "Backend returned HTTP 503");
        assert_eq!(BackendError::Timeout.to_string(), "Request timed out");
    }
}
