//! HTTP routes for the three listeners.

pub mod auth;
pub mod health;
pub mod nowplaying;
pub mod proxy;

pub use auth::{CallbackQuery, CallbackResponse, auth_routes, callback_handler, login_handler};
pub use health::{HealthResponse, health_routes};
pub use nowplaying::{cors_layer, current_track_handler, nowplaying_routes, queue_handler};
pub use proxy::{proxy_handler, proxy_routes};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::response::Response;
    use reqwest::Client;
    use sonar_cache::{SharedCache, TtlCache};
    use sonar_oauth::{
        CacheSnapshotStore, CredentialManager, NowPlaying, OAuthConfig, OAuthError,
        QueueSnapshot, TokenSource, UpstreamForwarder,
    };

    use crate::config::ServerConfig;
    use crate::state::AppState;

    pub const TEST_STATE: &str = "test-state";

    /// Token source with a fixed answer.
    #[derive(Debug)]
    pub struct StaticToken(pub Option<&'static str>);

    #[async_trait]
    impl TokenSource for StaticToken {
        async fn access_token(&self) -> sonar_oauth::Result<String> {
            self.0.map(str::to_string).ok_or(OAuthError::NoCredential)
        }
    }

    /// State with every upstream pointed at `upstream` and the token `live`
    /// served to the forwarder and player views.
    pub fn test_state(upstream: &str) -> AppState {
        let client = Client::new();
        let oauth = OAuthConfig::spotify(
            "client",
            "secret",
            "http://localhost/auth/callback",
            vec!["user-read-playback-state".to_string()],
        )
        .with_endpoints(
            format!("{}/authorize", upstream),
            format!("{}/api/token", upstream),
        );
        let credentials = Arc::new(CredentialManager::new(
            oauth,
            client.clone(),
            Arc::new(TtlCache::new()),
        ));

        let tokens = Arc::new(StaticToken(Some("live")));
        let forwarder = UpstreamForwarder::new(client.clone(), upstream, tokens.clone());
        let snapshots: SharedCache<QueueSnapshot> = Arc::new(TtlCache::new());
        let clock = snapshots.clock().clone();
        let nowplaying = NowPlaying::new(
            client,
            upstream,
            Arc::new(CacheSnapshotStore::new(snapshots)),
            clock,
        );

        AppState::new(
            credentials,
            Arc::new(forwarder),
            Arc::new(nowplaying),
            ServerConfig::new(TEST_STATE),
        )
        .with_token_source(tokens)
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
