//! GitLab API error types.

use thiserror::Error;

/// Errors that can occur when talking to the GitLab API.
#[derive(Debug, Error)]
pub enum GitLabError {
    /// The API rejected the access token (HTTP 401).
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GitLabError {
    /// Classify an HTTP status code and response body into a typed error.
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 401 {
            Self::Unauthorized(body.trim().to_string())
        } else {
            Self::Api {
                status,
                message: body.trim().to_string(),
            }
        }
    }

    /// Whether this error must stop the whole collection pass.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::Config(_))
    }
}

/// Whether a failed upstream request should be retried.
///
/// Everything except a credential rejection or a configuration problem is
/// treated as transient.
pub fn is_retryable(e: &GitLabError) -> bool {
    !e.is_fatal()
}
