//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use sonar_config::{ProxyRoutesConfig, SonarConfig};

/// Default queue snapshot interval (30 seconds).
pub const DEFAULT_QUEUE_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Login, callback and health.
    pub access_addr: SocketAddr,

    /// Authenticated forwarding.
    pub proxy_addr: SocketAddr,

    /// Current track and queue views.
    pub nowplaying_addr: SocketAddr,

    /// CORS allowed origins for the now-playing listener (empty = any origin).
    pub cors_origins: Vec<String>,

    /// State value the callback must echo back.
    pub expected_state: String,

    /// Print the refresh token to stdout after a successful login.
    pub refresh_token_output: bool,

    /// Minimum time between queue snapshot replacements.
    pub queue_snapshot_interval: Duration,

    /// Allow-list for the proxy listener. `None` forwards every path.
    pub proxy_routes: Option<ProxyRoutesConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            access_addr: SocketAddr::from(([0, 0, 0, 0], sonar_config::DEFAULT_ACCESS_PORT)),
            proxy_addr: SocketAddr::from(([0, 0, 0, 0], sonar_config::DEFAULT_PROXY_PORT)),
            nowplaying_addr: SocketAddr::from((
                [0, 0, 0, 0],
                sonar_config::DEFAULT_NOWPLAYING_PORT,
            )),
            cors_origins: Vec::new(),
            expected_state: String::new(),
            refresh_token_output: false,
            queue_snapshot_interval: DEFAULT_QUEUE_SNAPSHOT_INTERVAL,
            proxy_routes: None,
        }
    }
}

impl ServerConfig {
    /// Create a config that expects `state` on the callback.
    pub fn new(expected_state: impl Into<String>) -> Self {
        Self {
            expected_state: expected_state.into(),
            ..Default::default()
        }
    }

    /// Build from loaded application settings.
    pub fn from_settings(settings: &SonarConfig, expected_state: impl Into<String>) -> Self {
        Self::new(expected_state)
            .with_access_addr(settings.server.access_addr())
            .with_proxy_addr(settings.server.proxy_addr())
            .with_nowplaying_addr(settings.server.nowplaying_addr())
            .with_cors_origins(settings.server.cors_origins.clone())
            .with_refresh_token_output(settings.credentials.refresh_token_output)
            .with_queue_snapshot_interval(settings.nowplaying.queue_snapshot_interval())
    }

    /// Set the access listener address.
    pub fn with_access_addr(mut self, addr: SocketAddr) -> Self {
        self.access_addr = addr;
        self
    }

    /// Set the proxy listener address.
    pub fn with_proxy_addr(mut self, addr: SocketAddr) -> Self {
        self.proxy_addr = addr;
        self
    }

    /// Set the now-playing listener address.
    pub fn with_nowplaying_addr(mut self, addr: SocketAddr) -> Self {
        self.nowplaying_addr = addr;
        self
    }

    /// Set CORS allowed origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Print the refresh token after login.
    pub fn with_refresh_token_output(mut self, enabled: bool) -> Self {
        self.refresh_token_output = enabled;
        self
    }

    /// Set the queue snapshot interval.
    pub fn with_queue_snapshot_interval(mut self, interval: Duration) -> Self {
        self.queue_snapshot_interval = interval;
        self
    }

    /// Restrict the proxy listener to an allow-list.
    pub fn with_proxy_routes(mut self, routes: Option<ProxyRoutesConfig>) -> Self {
        self.proxy_routes = routes;
        self
    }

    /// Whether the proxy listener only forwards allow-listed routes.
    pub fn is_restricted(&self) -> bool {
        self.proxy_routes
            .as_ref()
            .is_some_and(|r| !r.routes.is_empty())
    }
}
