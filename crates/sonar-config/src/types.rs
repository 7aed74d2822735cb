//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]        # listener ports, CORS
//! [upstream]      # API and accounts endpoints
//! [credentials]   # OAuth client and optional refresh token
//! [nowplaying]    # queue snapshot interval
//! [proxy]         # allow-list file
//! [logging]       # level and log directory
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{ConfigError, Result};

/// Default port for the login/callback listener.
pub const DEFAULT_ACCESS_PORT: u16 = 8000;

/// Default port for the forwarding listener.
pub const DEFAULT_PROXY_PORT: u16 = 8001;

/// Default port for the now-playing listener.
pub const DEFAULT_NOWPLAYING_PORT: u16 = 8002;

/// Default upstream request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default queue snapshot interval in seconds.
pub const DEFAULT_QUEUE_SNAPSHOT_INTERVAL_SECS: u64 = 30;

/// Default max inbound body size for proxied requests (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default allow-list file name.
pub const DEFAULT_ROUTES_FILE: &str = "proxy-routes.yaml";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Every section is optional in the file and falls back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SonarConfig {
    pub server: ServerSection,
    pub upstream: UpstreamSection,
    pub credentials: CredentialsSection,
    pub nowplaying: NowPlayingSection,
    pub proxy: ProxySection,
    pub logging: LoggingSection,
}

impl SonarConfig {
    /// Create a config with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Check that the settings needed to talk to the accounts service are present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("credentials.client_id", env::CLIENT_ID, &self.credentials.client_id),
            (
                "credentials.client_secret",
                env::CLIENT_SECRET,
                &self.credentials.client_secret,
            ),
            (
                "credentials.redirect_uri",
                env::REDIRECT_URI,
                &self.credentials.redirect_uri,
            ),
        ];
        for (field, env_var, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                    env_var: env_var.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Interface all listeners bind to.
    pub host: IpAddr,
    /// Login, callback and health.
    pub access_port: u16,
    /// Authenticated forwarding.
    pub proxy_port: u16,
    /// Current track and queue views.
    pub nowplaying_port: u16,
    /// Origins allowed on the now-playing listener. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Accepted for compatibility; not enforced.
    pub trusted_proxies: Vec<String>,
    /// Max inbound body size for proxied requests.
    pub max_body_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            access_port: DEFAULT_ACCESS_PORT,
            proxy_port: DEFAULT_PROXY_PORT,
            nowplaying_port: DEFAULT_NOWPLAYING_PORT,
            cors_origins: Vec::new(),
            trusted_proxies: vec![
                "10.0.0.0/8".to_string(),
                "172.16.0.0/12".to_string(),
                "192.168.0.0/16".to_string(),
            ],
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerSection {
    pub fn access_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.access_port)
    }

    pub fn proxy_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.proxy_port)
    }

    pub fn nowplaying_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.nowplaying_port)
    }
}

/// Upstream endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSection {
    /// Origin proxied requests and player views go to.
    pub api_base: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Timeout applied to every upstream call.
    pub timeout_secs: u64,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            api_base: "https://api.spotify.com".to_string(),
            authorize_url: "https://accounts.spotify.com/authorize".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl UpstreamSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// OAuth client credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsSection {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Expected callback state. A random value is generated when unset.
    pub state: Option<String>,
    pub scopes: Vec<String>,
    /// Pre-provisioned refresh token for running without a browser login.
    pub refresh_token: Option<String>,
    /// Print the refresh token after a successful login.
    pub refresh_token_output: bool,
}

impl fmt::Debug for CredentialsSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsSection")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("redirect_uri", &self.redirect_uri)
            .field("state", &self.state.as_deref().map(redact))
            .field("scopes", &self.scopes)
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .field("refresh_token_output", &self.refresh_token_output)
            .finish()
    }
}

/// Now-playing view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NowPlayingSection {
    /// Minimum seconds between queue snapshot replacements.
    pub queue_snapshot_interval_secs: u64,
}

impl Default for NowPlayingSection {
    fn default() -> Self {
        Self {
            queue_snapshot_interval_secs: DEFAULT_QUEUE_SNAPSHOT_INTERVAL_SECS,
        }
    }
}

impl NowPlayingSection {
    pub fn queue_snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.queue_snapshot_interval_secs)
    }
}

/// Forwarding listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySection {
    /// YAML allow-list. A missing file means every path is forwarded.
    pub routes_file: PathBuf,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            routes_file: PathBuf::from(DEFAULT_ROUTES_FILE),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive for the console, e.g. `info` or `sonar=debug`.
    pub level: String,
    /// Directory for rotating JSON logs. Defaults to `<config dir>/logs`.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Mask all but the first four characters of a secret.
pub fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}…", visible)
}
