//! OAuth 2.0 authorization-code flow against the upstream accounts service.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{OAuthError, Result};

/// Spotify accounts authorization endpoint.
pub const SPOTIFY_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

/// Spotify accounts token endpoint.
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// OAuth client configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a config for the Spotify accounts service.
    pub fn spotify(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorize_url: SPOTIFY_AUTHORIZE_URL.to_string(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            redirect_uri: redirect_uri.into(),
            scopes,
        }
    }

    /// Point the flow at different accounts endpoints.
    pub fn with_endpoints(
        mut self,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.authorize_url = authorize_url.into();
        self.token_url = token_url.into();
        self
    }
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut state_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut state_bytes);
    URL_SAFE_NO_PAD.encode(state_bytes)
}

/// Build the authorization URL for the OAuth flow.
pub fn build_authorization_url(config: &OAuthConfig, state: &str) -> String {
    let scope = config.scopes.join(" ");
    let mut params = vec![
        ("client_id", config.client_id.as_str()),
        ("response_type", "code"),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];
    if !scope.is_empty() {
        params.push(("scope", scope.as_str()));
    }
    params.push(("state", state));

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", config.authorize_url, query)
}

/// Token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent on refresh responses that keep the existing refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

/// Which grant a token request is for; selects the error variant.
#[derive(Debug, Clone, Copy)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

impl Grant {
    /// `rejected` means the token endpoint refused the grant itself (4xx).
    fn fail(self, message: String, rejected: bool) -> OAuthError {
        match self {
            Grant::AuthorizationCode if rejected => OAuthError::Exchange(message),
            Grant::AuthorizationCode => OAuthError::UpstreamUnavailable(message),
            Grant::RefreshToken => OAuthError::Refresh { message, rejected },
        }
    }

    fn malformed(self, message: String) -> OAuthError {
        match self {
            Grant::AuthorizationCode => OAuthError::Exchange(message),
            Grant::RefreshToken => OAuthError::Refresh {
                message,
                rejected: false,
            },
        }
    }
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(client: &Client, config: &OAuthConfig, code: &str) -> Result<TokenResponse> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];
    request_token(client, config, &form, Grant::AuthorizationCode).await
}

/// Obtain a new access token using a refresh token.
pub async fn refresh_access_token(
    client: &Client,
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];
    request_token(client, config, &form, Grant::RefreshToken).await
}

async fn request_token(
    client: &Client,
    config: &OAuthConfig,
    form: &[(&str, &str)],
    grant: Grant,
) -> Result<TokenResponse> {
    let response = client
        .post(&config.token_url)
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .form(form)
        .send()
        .await
        .map_err(|e| grant.fail(format!("token request failed: {}", e), false))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        // Only a 4xx is a verdict on the grant; 5xx is an outage.
        return Err(grant.fail(
            format!("{}: {}", status, error_text),
            status.is_client_error(),
        ));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| grant.malformed(format!("malformed token response: {}", e)))
}
