//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use sonar_cache::TtlCache;
use sonar_config::{ProxyRoutesConfig, SonarConfig};
use sonar_server::{AppState, Server};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

pub const STATE: &str = "integration-state";

/// A server running in the background against a mock upstream.
pub struct TestServer {
    pub access: SocketAddr,
    pub proxy: SocketAddr,
    pub nowplaying: SocketAddr,
    /// Mock accounts service and API.
    pub upstream: MockServer,
    /// Client that does not follow redirects.
    pub client: Client,
    shutdown: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start with default settings.
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}, None).await
    }

    /// Start after letting the caller adjust settings.
    pub async fn start_with(
        adjust: impl FnOnce(&mut SonarConfig),
        routes: Option<ProxyRoutesConfig>,
    ) -> Result<Self> {
        let upstream = MockServer::start().await;

        let mut settings = SonarConfig::new();
        settings.credentials.client_id = "client".to_string();
        settings.credentials.client_secret = "secret".to_string();
        settings.credentials.redirect_uri = "http://localhost/auth/callback".to_string();
        settings.credentials.scopes = vec!["user-read-playback-state".to_string()];
        settings.upstream.api_base = upstream.uri();
        settings.upstream.authorize_url = format!("{}/authorize", upstream.uri());
        settings.upstream.token_url = format!("{}/api/token", upstream.uri());
        settings.upstream.timeout_secs = 2;
        adjust(&mut settings);

        let state = AppState::from_settings(
            &settings,
            STATE,
            routes,
            Arc::new(TtlCache::new()),
            Arc::new(TtlCache::new()),
        )?;

        let any: SocketAddr = "127.0.0.1:0".parse()?;
        let bound = Server::new(state).bind_to(any, any, any).await?;
        let access = bound.access_addr()?;
        let proxy = bound.proxy_addr()?;
        let nowplaying = bound.nowplaying_addr()?;

        let shutdown = CancellationToken::new();
        let serving = shutdown.clone();
        let handle = tokio::spawn(async move {
            let _ = bound.serve(serving).await;
        });

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        wait_for_server(&client, access).await?;

        Ok(Self {
            access,
            proxy,
            nowplaying,
            upstream,
            client,
            shutdown,
            _handle: handle,
        })
    }

    pub fn access_url(&self, path: &str) -> String {
        format!("http://{}{}", self.access, path)
    }

    pub fn proxy_url(&self, path: &str) -> String {
        format!("http://{}{}", self.proxy, path)
    }

    pub fn nowplaying_url(&self, path: &str) -> String {
        format!("http://{}{}", self.nowplaying, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
