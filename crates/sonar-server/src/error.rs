//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sonar_oauth::OAuthError;
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Callback arrived without an authorization code.
    #[error("Missing code")]
    MissingCode,

    /// Callback state did not match the expected value.
    #[error("Mismatched state")]
    StateMismatch,

    /// The authorization code was rejected.
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    /// No usable credential; a login is required.
    #[error("{0}")]
    Credential(String),

    /// Upstream could not be reached.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream answered with an error status.
    #[error("Upstream returned {status}")]
    UpstreamStatus { status: u16, body: String },

    /// Upstream body could not be decoded.
    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<OAuthError> for ServerError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::Exchange(msg) => ServerError::Exchange(msg),
            OAuthError::NoCredential | OAuthError::Refresh { .. } => {
                ServerError::Credential(e.to_string())
            }
            OAuthError::UpstreamUnavailable(msg) => ServerError::UpstreamUnavailable(msg),
            OAuthError::UpstreamStatus { status, body } => ServerError::UpstreamStatus {
                status: status.as_u16(),
                body,
            },
            OAuthError::Decode(msg) => ServerError::Decode(msg),
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ServerError {
    /// Status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::MissingCode => (StatusCode::BAD_REQUEST, "missing_code"),
            ServerError::StateMismatch => (StatusCode::BAD_REQUEST, "state_mismatch"),
            ServerError::Exchange(_) => (StatusCode::BAD_REQUEST, "exchange_failed"),
            ServerError::Credential(_) => (StatusCode::INTERNAL_SERVER_ERROR, "credential_error"),
            ServerError::UpstreamUnavailable(_) => (StatusCode::BAD_GATEWAY, "upstream_unavailable"),
            ServerError::UpstreamStatus { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            ServerError::Decode(_) => (StatusCode::BAD_GATEWAY, "decode_error"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ServerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        }
    }

    /// Message shown to the client. Upstream details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ServerError::UpstreamUnavailable(_)
            | ServerError::UpstreamStatus { .. }
            | ServerError::Decode(_) => "Bad gateway".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let detail = match &self {
            ServerError::UpstreamStatus { body, .. } => format!("{} ({})", self, body),
            _ => self.to_string(),
        };

        if status.is_server_error() {
            tracing::warn!(status = %status, code, error = %detail, "Server error");
        } else {
            tracing::debug!(status = %status, code, error = %detail, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}
