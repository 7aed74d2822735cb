//! Credential lifecycle for the single upstream identity.
//!
//! The manager owns the `access_token` and `refresh_token` cache keys. The
//! refresh token is stored without expiration; the access token is stored
//! with a ttl that ends one minute before the upstream-reported expiry, so an
//! access token is never served inside that margin.
//!
//! Only one identity is managed per process. Running several instances needs
//! sticky routing or a shared credential store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::Client;
use sonar_cache::{NO_EXPIRATION, SharedCache, SharedClock};
use tracing::{debug, info, warn};

use crate::error::{OAuthError, Result};
use crate::oauth::{self, OAuthConfig, TokenResponse};

/// Cache key for the current access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Cache key for the refresh token obtained through interactive login.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Margin subtracted from the upstream expiry before an access token is
/// considered unusable.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ============================================================================
// TokenSource Trait
// ============================================================================

/// Anything that can hand out a valid upstream access token.
#[async_trait]
pub trait TokenSource: Send + Sync + std::fmt::Debug {
    /// Get a valid access token, refreshing if necessary.
    async fn access_token(&self) -> Result<String>;
}

/// Shared token source for use across handlers.
pub type SharedTokenSource = Arc<dyn TokenSource>;

// ============================================================================
// CredentialPair
// ============================================================================

/// Tokens returned by a successful exchange or refresh.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    /// Upstream expiry of the access token.
    pub expires_at: Instant,
    pub obtained_at: DateTime<Utc>,
}

impl CredentialPair {
    /// An `expires_in` too large to add to `now` is treated as already
    /// expired, so the access token is used once but never cached.
    fn from_response(tokens: TokenResponse, fallback_refresh: &str, now: Instant) -> Self {
        Self {
            refresh_token: tokens
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| fallback_refresh.to_string()),
            expires_at: now
                .checked_add(Duration::from_secs(tokens.expires_in))
                .unwrap_or(now),
            expires_in: tokens.expires_in,
            access_token: tokens.access_token,
            obtained_at: Utc::now(),
        }
    }
}

/// Authentication state of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No usable credential; an interactive login is required unless a
    /// refresh token was pre-provisioned.
    Unauthenticated,
    /// A login or refresh has succeeded.
    Authenticated,
}

// ============================================================================
// CredentialManager
// ============================================================================

/// OAuth credential manager backed by the TTL cache.
#[derive(Debug)]
pub struct CredentialManager {
    config: OAuthConfig,
    client: Client,
    cache: SharedCache<String>,
    clock: SharedClock,
    /// Operator-supplied refresh token for headless operation.
    provisioned_refresh_token: Option<String>,
    state: RwLock<AuthState>,
}

impl CredentialManager {
    /// Create a manager that stores credentials in `cache`.
    ///
    /// The cache's clock is used for all expiry arithmetic.
    pub fn new(config: OAuthConfig, client: Client, cache: SharedCache<String>) -> Self {
        let clock = cache.clock().clone();
        Self {
            config,
            client,
            cache,
            clock,
            provisioned_refresh_token: None,
            state: RwLock::new(AuthState::Unauthenticated),
        }
    }

    /// Use an operator-supplied refresh token in preference to a cached one.
    pub fn with_provisioned_refresh_token(mut self, token: Option<String>) -> Self {
        self.provisioned_refresh_token = token.filter(|t| !t.is_empty());
        self
    }

    /// The OAuth client configuration.
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Current authentication state.
    pub fn state(&self) -> AuthState {
        *self.state.read()
    }

    /// Build the upstream authorization URL carrying `state`.
    pub fn authorization_url(&self, state: &str) -> String {
        oauth::build_authorization_url(&self.config, state)
    }

    /// Exchange an authorization code for tokens and cache them.
    ///
    /// The caller must have validated the callback `state` already.
    pub async fn complete_authorization(&self, code: &str) -> Result<CredentialPair> {
        let tokens = oauth::exchange_code(&self.client, &self.config, code).await?;
        let pair = CredentialPair::from_response(tokens, "", self.clock.now());
        if pair.refresh_token.is_empty() {
            return Err(OAuthError::Exchange(
                "token response did not include a refresh token".to_string(),
            ));
        }

        self.cache
            .set(REFRESH_TOKEN_KEY, pair.refresh_token.clone(), NO_EXPIRATION);
        self.store_access_token(&pair);
        *self.state.write() = AuthState::Authenticated;

        info!(expires_in = pair.expires_in, "Authorization completed");
        Ok(pair)
    }

    /// Get a valid access token.
    ///
    /// Serves the cached token when present. Otherwise refreshes with
    /// `provisioned` if given, else with the refresh token cached by a prior
    /// login. Fails with [`OAuthError::NoCredential`] without any network
    /// call when neither exists.
    pub async fn get_access_token(&self, provisioned: Option<&str>) -> Result<String> {
        if let Some(token) = self.cache.get(ACCESS_TOKEN_KEY) {
            debug!("Access token cache hit");
            return Ok(token);
        }

        let (refresh_token, from_cache) = match provisioned.filter(|t| !t.is_empty()) {
            Some(token) => (token.to_string(), false),
            None => match self.cache.get(REFRESH_TOKEN_KEY) {
                Some(token) => (token, true),
                None => {
                    *self.state.write() = AuthState::Unauthenticated;
                    return Err(OAuthError::NoCredential);
                }
            },
        };

        info!(provisioned = !from_cache, "Access token missing or expired, refreshing");
        let tokens = match oauth::refresh_access_token(&self.client, &self.config, &refresh_token).await
        {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                *self.state.write() = AuthState::Unauthenticated;
                if from_cache && matches!(e, OAuthError::Refresh { rejected: true, .. }) {
                    // A refused refresh token cannot recover; force a new login.
                    self.cache.remove(REFRESH_TOKEN_KEY);
                }
                return Err(e);
            }
        };

        let pair = CredentialPair::from_response(tokens, &refresh_token, self.clock.now());
        if from_cache && pair.refresh_token != refresh_token {
            self.cache
                .set(REFRESH_TOKEN_KEY, pair.refresh_token.clone(), NO_EXPIRATION);
        }
        self.store_access_token(&pair);
        *self.state.write() = AuthState::Authenticated;
        info!(expires_in = pair.expires_in, "Token refreshed successfully");

        Ok(pair.access_token)
    }

    /// Cache the access token until one margin before its expiry.
    ///
    /// Tokens that expire within the margin are not cached at all.
    fn store_access_token(&self, pair: &CredentialPair) {
        let remaining = pair.expires_at.saturating_duration_since(self.clock.now());
        match remaining.checked_sub(EXPIRY_MARGIN) {
            Some(ttl) if !ttl.is_zero() => {
                self.cache.set(ACCESS_TOKEN_KEY, pair.access_token.clone(), ttl);
            }
            _ => {
                warn!(
                    expires_in = pair.expires_in,
                    "Access token expires within the safety margin, not caching"
                );
                self.cache.remove(ACCESS_TOKEN_KEY);
            }
        }
    }
}

#[async_trait]
impl TokenSource for CredentialManager {
    async fn access_token(&self) -> Result<String> {
        self.get_access_token(self.provisioned_refresh_token.as_deref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_cache::{ManualClock, TtlCache};
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        server: MockServer,
        clock: Arc<ManualClock>,
        cache: SharedCache<String>,
        manager: CredentialManager,
    }

    async fn fixture() -> Fixture {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::new());
        let cache: SharedCache<String> = Arc::new(TtlCache::with_clock(clock.clone()));
        let config = OAuthConfig::spotify("id", "secret", "http://localhost/cb", vec![])
            .with_endpoints(
                format!("{}/authorize", server.uri()),
                format!("{}/api/token", server.uri()),
            );
        let manager = CredentialManager::new(config, Client::new(), cache.clone());
        Fixture {
            server,
            clock,
            cache,
            manager,
        }
    }

    fn token_body(access: &str, refresh: Option<&str>, expires_in: u64) -> serde_json::Value {
        let mut body = serde_json::json!({
            "access_token": access,
            "expires_in": expires_in,
            "token_type": "Bearer",
            "scope": ""
        });
        if let Some(r) = refresh {
            body["refresh_token"] = serde_json::json!(r);
        }
        body
    }

    #[tokio::test]
    async fn test_complete_authorization_caches_both_tokens() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_body("a1", Some("r1"), 3600)),
            )
            .expect(1)
            .mount(&f.server)
            .await;

        assert_eq!(f.manager.state(), AuthState::Unauthenticated);
        let pair = f.manager.complete_authorization("code").await.unwrap();
        assert_eq!(pair.access_token, "a1");
        assert_eq!(f.manager.state(), AuthState::Authenticated);
        assert_eq!(f.cache.get(ACCESS_TOKEN_KEY).as_deref(), Some("a1"));
        assert_eq!(f.cache.get(REFRESH_TOKEN_KEY).as_deref(), Some("r1"));

        // Served from cache, no further token calls (expect(1) above)
        assert_eq!(f.manager.get_access_token(None).await.unwrap(), "a1");
    }

    #[tokio::test]
    async fn test_access_token_unreadable_one_minute_before_expiry() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_body("a1", Some("r1"), 3600)),
            )
            .mount(&f.server)
            .await;

        f.manager.complete_authorization("code").await.unwrap();

        f.clock.advance(Duration::from_secs(3600 - 61));
        assert_eq!(f.cache.get(ACCESS_TOKEN_KEY).as_deref(), Some("a1"));

        f.clock.advance(Duration::from_secs(1));
        assert_eq!(f.cache.get(ACCESS_TOKEN_KEY), None);
        // The refresh token never expires
        assert_eq!(f.cache.get(REFRESH_TOKEN_KEY).as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_short_lived_token_is_not_cached() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_body("brief", Some("r1"), 30)),
            )
            .mount(&f.server)
            .await;

        let pair = f.manager.complete_authorization("code").await.unwrap();
        assert_eq!(pair.access_token, "brief");
        assert_eq!(f.cache.get(ACCESS_TOKEN_KEY), None);
    }

    #[tokio::test]
    async fn test_exchange_rejected() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .mount(&f.server)
            .await;

        let err = f.manager.complete_authorization("reused").await.unwrap_err();
        assert!(matches!(err, OAuthError::Exchange(_)));
        assert_eq!(f.manager.state(), AuthState::Unauthenticated);
        assert!(f.cache.is_empty());
    }

    #[tokio::test]
    async fn test_no_credential_makes_no_network_call() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&f.server)
            .await;

        let err = f.manager.get_access_token(None).await.unwrap_err();
        assert!(matches!(err, OAuthError::NoCredential));
        assert!(err.requires_login());
    }

    #[tokio::test]
    async fn test_provisioned_refresh_token_preferred_over_cached() {
        let f = fixture().await;
        f.cache
            .set(REFRESH_TOKEN_KEY, "cached-refresh".to_string(), NO_EXPIRATION);

        Mock::given(method("POST"))
            .and(body_string_contains("refresh_token=env-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("from-env", None, 3600)))
            .expect(1)
            .mount(&f.server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("refresh_token=cached-refresh"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_body("from-cache", None, 3600)),
            )
            .expect(0)
            .mount(&f.server)
            .await;

        let token = f.manager.get_access_token(Some("env-refresh")).await.unwrap();
        assert_eq!(token, "from-env");
        assert_eq!(f.cache.get(ACCESS_TOKEN_KEY).as_deref(), Some("from-env"));
    }

    #[tokio::test]
    async fn test_refresh_with_cached_token_after_expiry() {
        let f = fixture().await;
        f.cache.set(REFRESH_TOKEN_KEY, "r1".to_string(), NO_EXPIRATION);

        Mock::given(method("POST"))
            .and(body_string_contains("refresh_token=r1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_body("a2", Some("r2"), 3600)),
            )
            .expect(1)
            .mount(&f.server)
            .await;

        assert_eq!(f.manager.get_access_token(None).await.unwrap(), "a2");
        assert_eq!(f.manager.state(), AuthState::Authenticated);
        // Rotated refresh token replaces the cached one
        assert_eq!(f.cache.get(REFRESH_TOKEN_KEY).as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_rejected_refresh_demotes_to_unauthenticated() {
        let f = fixture().await;
        f.cache.set(REFRESH_TOKEN_KEY, "revoked".to_string(), NO_EXPIRATION);

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .expect(1)
            .mount(&f.server)
            .await;

        let err = f.manager.get_access_token(None).await.unwrap_err();
        assert!(matches!(err, OAuthError::Refresh { rejected: true, .. }));
        assert_eq!(f.manager.state(), AuthState::Unauthenticated);

        // Next call needs an interactive login and does not hit the network
        let err = f.manager.get_access_token(None).await.unwrap_err();
        assert!(matches!(err, OAuthError::NoCredential));
    }

    #[tokio::test]
    async fn test_token_endpoint_outage_keeps_refresh_token() {
        let f = fixture().await;
        f.cache.set(REFRESH_TOKEN_KEY, "good-refresh".to_string(), NO_EXPIRATION);

        Mock::given(method("POST"))
            .and(body_string_contains("refresh_token=good-refresh"))
            .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&f.server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("refresh_token=good-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a2", None, 3600)))
            .expect(1)
            .mount(&f.server)
            .await;

        let err = f.manager.get_access_token(None).await.unwrap_err();
        assert!(matches!(err, OAuthError::Refresh { rejected: false, .. }));
        assert_eq!(f.cache.get(REFRESH_TOKEN_KEY).as_deref(), Some("good-refresh"));

        // Upstream recovered
        assert_eq!(f.manager.get_access_token(None).await.unwrap(), "a2");
        assert_eq!(f.manager.state(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn test_malformed_refresh_response_keeps_refresh_token() {
        let f = fixture().await;
        f.cache.set(REFRESH_TOKEN_KEY, "r1".to_string(), NO_EXPIRATION);

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&f.server)
            .await;

        let err = f.manager.get_access_token(None).await.unwrap_err();
        assert!(!err.requires_login());
        assert_eq!(f.cache.get(REFRESH_TOKEN_KEY).as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_absurd_expiry_is_not_cached() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("forever", Some("r1"), u64::MAX)),
            )
            .mount(&f.server)
            .await;

        let pair = f.manager.complete_authorization("code").await.unwrap();
        assert_eq!(pair.access_token, "forever");
        assert_eq!(f.cache.get(ACCESS_TOKEN_KEY), None);
        assert_eq!(f.cache.get(REFRESH_TOKEN_KEY).as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_token_source_uses_provisioned_token() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(body_string_contains("refresh_token=headless"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a", None, 3600)))
            .expect(1)
            .mount(&f.server)
            .await;

        let manager = f
            .manager
            .with_provisioned_refresh_token(Some("headless".to_string()));
        let source: &dyn TokenSource = &manager;
        assert_eq!(source.access_token().await.unwrap(), "a");
        assert_eq!(source.access_token().await.unwrap(), "a");
    }
}
