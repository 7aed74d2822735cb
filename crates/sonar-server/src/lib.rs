//! HTTP listeners for the Sonar proxy.
//!
//! Three listeners share one [`AppState`]:
//!
//! - **access**: `/`, `/health`, `/auth/login`, `/auth/callback`
//! - **proxy**: authenticated forwarding, optionally restricted by an allow-list
//! - **nowplaying**: `/health`, `/current-track`, `/queue` with CORS
//!
//! # Example
//!
//! ```ignore
//! use sonar_server::{AppState, Server};
//!
//! let state = AppState::from_settings(&settings, state, routes, creds, snapshots)?;
//! Server::new(state).run().await?;
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use state::AppState;

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// The Sonar HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a server from application state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Login, callback and health.
    pub fn access_router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .merge(routes::auth_routes())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Authenticated forwarding.
    pub fn proxy_router(&self) -> Router {
        routes::proxy_routes(self.state.config.proxy_routes.as_ref())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Current track and queue views.
    pub fn nowplaying_router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .merge(routes::nowplaying_routes(&self.state.config.cors_origins))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind all listeners to their configured addresses.
    pub async fn bind(self) -> Result<BoundServer> {
        let config = self.state.config.clone();
        self.bind_to(config.access_addr, config.proxy_addr, config.nowplaying_addr)
            .await
    }

    /// Bind all listeners to explicit addresses (useful for testing).
    pub async fn bind_to(
        self,
        access: SocketAddr,
        proxy: SocketAddr,
        nowplaying: SocketAddr,
    ) -> Result<BoundServer> {
        Ok(BoundServer {
            access: bind("access", access).await?,
            proxy: bind("proxy", proxy).await?,
            nowplaying: bind("nowplaying", nowplaying).await?,
            server: self,
        })
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    signal.cancel();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        });

        self.bind().await?.serve(shutdown).await
    }
}

/// A server whose listeners are bound but not yet serving.
pub struct BoundServer {
    server: Server,
    access: TcpListener,
    proxy: TcpListener,
    nowplaying: TcpListener,
}

impl BoundServer {
    pub fn access_addr(&self) -> Result<SocketAddr> {
        local_addr(&self.access)
    }

    pub fn proxy_addr(&self) -> Result<SocketAddr> {
        local_addr(&self.proxy)
    }

    pub fn nowplaying_addr(&self) -> Result<SocketAddr> {
        local_addr(&self.nowplaying)
    }

    /// Serve all listeners until `shutdown` is cancelled or one fails.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let access = self.server.access_router();
        let proxy = self.server.proxy_router();
        let nowplaying = self.server.nowplaying_router();

        if self.server.state.config.is_restricted() {
            info!("Proxy restricted to the configured allow-list");
        }

        tokio::try_join!(
            serve("access", self.access, access, shutdown.clone()),
            serve("proxy", self.proxy, proxy, shutdown.clone()),
            serve("nowplaying", self.nowplaying, nowplaying, shutdown),
        )?;

        info!("All listeners stopped");
        Ok(())
    }
}

async fn bind(name: &str, addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|e| {
        ServerError::Internal(format!(
            "Failed to bind {} listener on {}: {}",
            name, addr, e
        ))
    })
}

fn local_addr(listener: &TcpListener) -> Result<SocketAddr> {
    listener
        .local_addr()
        .map_err(|e| ServerError::Internal(format!("Failed to read local address: {}", e)))
}

async fn serve(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = local_addr(&listener)?;
    info!(listener = name, %addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| ServerError::Internal(format!("{} listener failed: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::test_state;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn server() -> Server {
        Server::new(test_state("http://127.0.0.1:9"))
    }

    async fn status(router: Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_on_access_and_nowplaying() {
        let server = server();
        assert_eq!(status(server.access_router(), "/health").await, StatusCode::OK);
        assert_eq!(
            status(server.nowplaying_router(), "/health").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_listeners_are_separate() {
        let server = server();
        assert_eq!(
            status(server.access_router(), "/queue").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(server.nowplaying_router(), "/auth/login").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_bind_and_shutdown() {
        let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let bound = server().bind_to(any, any, any).await.unwrap();
        assert_ne!(bound.access_addr().unwrap(), bound.proxy_addr().unwrap());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(bound.serve(shutdown.clone()));
        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }
}
