//! Error types for the credential and forwarding layer.

use reqwest::StatusCode;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while obtaining credentials or calling upstream.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Authorization code was rejected (expired, reused, or redirect URI mismatch).
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    /// No refresh token is available; an interactive login is required.
    #[error("No refresh token found in cache or environment, try logging in")]
    NoCredential,

    /// Refreshing the access token failed.
    ///
    /// `rejected` is set when the token endpoint answered and refused the
    /// refresh token, as opposed to being unreachable.
    #[error("Token refresh failed: {message}")]
    Refresh { message: String, rejected: bool },

    /// Upstream could not be reached or timed out.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream answered with a non-success status.
    #[error("Upstream returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    /// Upstream body did not match the expected shape.
    #[error("Failed to decode upstream response: {0}")]
    Decode(String),
}

impl OAuthError {
    /// Whether this error means the caller must log in again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            OAuthError::NoCredential | OAuthError::Refresh { rejected: true, .. }
        )
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            OAuthError::Decode(e.to_string())
        } else {
            OAuthError::UpstreamUnavailable(e.to_string())
        }
    }
}

impl From<serde_json::Error> for OAuthError {
    fn from(e: serde_json::Error) -> Self {
        OAuthError::Decode(e.to_string())
    }
}
