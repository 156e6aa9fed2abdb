//! Client error types

use cinema_core::CoreError;
use reqwest::StatusCode;
use thiserror::Error;

/// Every way a client call can fail
///
/// Transport errors never escape raw: they are folded into
/// [`ClientError::Network`].
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The session is gone: refresh failed or the replayed request was
    /// rejected again. The local session has been cleared.
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The request conflicts with server state (e.g. seats already booked)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Too many requests
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Input rejected, locally or by the server
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Server returned an error status, or a body the client cannot read
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// No connectivity, timeout or broken connection
    #[error("Network error: {0}")]
    Network(String),

    /// The session store could not be read or written
    #[error("Session storage failed: {0}")]
    Session(CoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 | 422 => Self::Validation(message),
            401 => Self::Unauthenticated(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            429 => Self::RateLimited(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// A 2xx response whose body could not be decoded
    pub(crate) fn invalid_response(status: StatusCode, detail: impl std::fmt::Display) -> Self {
        Self::ServerError {
            status: status.as_u16(),
            message: format!("invalid response body: {detail}"),
        }
    }

    /// Whether the caller has to sign in again
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated(_))
    }

    /// Whether repeating the same call later may succeed
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited(_) => true,
            Self::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status this error corresponds to
    ///
    /// Validation errors report 400 whether the server sent 400 or 422, or
    /// the input was rejected before sending.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Validation(_) => Some(400),
            Self::Unauthenticated(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            Self::RateLimited(_) => Some(429),
            Self::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "could not connect to server"
        } else {
            "request failed"
        };
        Self::Network(format!("{kind}: {err}"))
    }
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { .. } => Self::Validation(err.to_string()),
            other => Self::Session(other),
        }
    }
}
