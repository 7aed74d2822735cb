//! Start command - runs the access, proxy and now-playing listeners.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use sonar_cache::{DEFAULT_SWEEP_INTERVAL, SharedCache, TtlCache, spawn_sweeper};
use sonar_oauth::QueueSnapshot;
use sonar_server::{AppState, Server};
use tracing::{info, warn};

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file and environment values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port for login and callback (overrides ACCESS_PORT)
    #[arg(long)]
    pub access_port: Option<u16>,

    /// Port for authenticated forwarding (overrides PROXY_PORT)
    #[arg(long)]
    pub proxy_port: Option<u16>,

    /// Port for the now-playing views (overrides NOWPLAYING_PORT)
    #[arg(long)]
    pub nowplaying_port: Option<u16>,

    /// Proxy allow-list YAML (default: proxy-routes.yaml)
    #[arg(long)]
    pub routes: Option<PathBuf>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: Context) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(port) = args.access_port {
        config.server.access_port = port;
    }
    if let Some(port) = args.proxy_port {
        config.server.proxy_port = port;
    }
    if let Some(port) = args.nowplaying_port {
        config.server.nowplaying_port = port;
    }
    if let Some(path) = args.routes {
        config.proxy.routes_file = path;
    }

    config.validate().context("incomplete configuration")?;

    let routes = sonar_config::load_proxy_routes(&config.proxy.routes_file)
        .with_context(|| format!("invalid routes file {}", config.proxy.routes_file.display()))?;
    match &routes {
        Some(r) => info!(
            path = %config.proxy.routes_file.display(),
            routes = r.routes.len(),
            "Loaded proxy allow-list"
        ),
        None => info!("No proxy allow-list found, forwarding every path"),
    }

    if !config.server.trusted_proxies.is_empty() {
        info!(
            trusted_proxies = ?config.server.trusted_proxies,
            "Trusted proxies configured but not enforced"
        );
    }

    let (state, generated) = ctx.callback_state();
    if generated {
        info!("No SPOTIFY_STATE configured, generated a random callback state");
    }

    let credential_cache: SharedCache<String> = Arc::new(TtlCache::new());
    let snapshot_cache: SharedCache<QueueSnapshot> = Arc::new(TtlCache::new());
    let _credential_sweeper = spawn_sweeper(&credential_cache, DEFAULT_SWEEP_INTERVAL);
    let _snapshot_sweeper = spawn_sweeper(&snapshot_cache, DEFAULT_SWEEP_INTERVAL);

    let app = AppState::from_settings(&config, state, routes, credential_cache, snapshot_cache)?;

    if config.credentials.refresh_token.is_none() {
        warn!(
            "No SPOTIFY_REFRESH_TOKEN set; log in at http://{}/auth/login before using the proxy",
            config.server.access_addr()
        );
    }

    info!(
        access = %config.server.access_addr(),
        proxy = %config.server.proxy_addr(),
        nowplaying = %config.server.nowplaying_addr(),
        "Starting Sonar"
    );
    Server::new(app).run().await?;

    info!("Sonar stopped");
    Ok(())
}
