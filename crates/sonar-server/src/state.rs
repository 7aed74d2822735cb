//! Application state shared across handlers.

use std::sync::Arc;

use reqwest::Client;
use sonar_cache::SharedCache;
use sonar_config::{ProxyRoutesConfig, SonarConfig};
use sonar_oauth::{
    CacheSnapshotStore, CredentialManager, NowPlaying, OAuthConfig, QueueSnapshot,
    SharedForwarder, SharedTokenSource, UpstreamForwarder,
};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Login and callback.
    pub credentials: Arc<CredentialManager>,

    /// Access tokens for the now-playing views.
    pub tokens: SharedTokenSource,

    /// Relays requests on the proxy listener.
    pub forwarder: SharedForwarder,

    /// Current track and queue views.
    pub nowplaying: Arc<NowPlaying>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create state where the credential manager also supplies tokens.
    pub fn new(
        credentials: Arc<CredentialManager>,
        forwarder: SharedForwarder,
        nowplaying: Arc<NowPlaying>,
        config: ServerConfig,
    ) -> Self {
        Self {
            tokens: credentials.clone(),
            credentials,
            forwarder,
            nowplaying,
            config: Arc::new(config),
        }
    }

    /// Wire every component from loaded settings.
    ///
    /// Both caches are owned by the caller so it can attach sweepers and
    /// decide their lifetime.
    pub fn from_settings(
        settings: &SonarConfig,
        expected_state: impl Into<String>,
        proxy_routes: Option<ProxyRoutesConfig>,
        credential_cache: SharedCache<String>,
        snapshot_cache: SharedCache<QueueSnapshot>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.upstream.timeout())
            .build()
            .map_err(|e| ServerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let creds = &settings.credentials;
        let oauth = OAuthConfig::spotify(
            creds.client_id.clone(),
            creds.client_secret.clone(),
            creds.redirect_uri.clone(),
            creds.scopes.clone(),
        )
        .with_endpoints(
            settings.upstream.authorize_url.clone(),
            settings.upstream.token_url.clone(),
        );

        let credentials = Arc::new(
            CredentialManager::new(oauth, client.clone(), credential_cache)
                .with_provisioned_refresh_token(creds.refresh_token.clone()),
        );
        let tokens: SharedTokenSource = credentials.clone();

        let forwarder = UpstreamForwarder::new(
            client.clone(),
            settings.upstream.api_base.clone(),
            tokens.clone(),
        )
        .with_max_body_size(settings.server.max_body_size);

        let clock = snapshot_cache.clock().clone();
        let nowplaying = NowPlaying::new(
            client,
            settings.upstream.api_base.clone(),
            Arc::new(CacheSnapshotStore::new(snapshot_cache)),
            clock,
        );

        let config =
            ServerConfig::from_settings(settings, expected_state).with_proxy_routes(proxy_routes);

        Ok(Self::new(
            credentials,
            Arc::new(forwarder),
            Arc::new(nowplaying),
            config,
        ))
    }

    /// Replace the token source used by the now-playing views.
    pub fn with_token_source(mut self, tokens: SharedTokenSource) -> Self {
        self.tokens = tokens;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_cache::TtlCache;

    #[test]
    fn test_from_settings() {
        let mut settings = SonarConfig::new();
        settings.credentials.client_id = "id".to_string();
        settings.credentials.scopes = vec!["user-read-playback-state".to_string()];
        settings.server.access_port = 9000;

        let state = AppState::from_settings(
            &settings,
            "expected",
            None,
            Arc::new(TtlCache::new()),
            Arc::new(TtlCache::new()),
        )
        .unwrap();

        assert_eq!(state.config.expected_state, "expected");
        assert_eq!(state.config.access_addr.port(), 9000);
        let url = state.credentials.authorization_url("expected");
        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(url.contains("client_id=id"));
    }
}
