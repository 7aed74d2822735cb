//! Authenticated forwarding of inbound requests to the upstream API.
//!
//! Method, path, query and body are relayed as-is. Inbound headers are copied
//! except `host` and hop-by-hop headers, and `Authorization` is replaced with
//! the managed bearer token. The upstream status, headers and body are
//! streamed back unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Json;
use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, warn};

use crate::token_manager::SharedTokenSource;

/// Spotify Web API base URL.
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com";

/// Default limit for buffered inbound request bodies (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Connection-scoped headers that must not be relayed.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Relays a request upstream and returns the upstream response.
#[async_trait]
pub trait Forwarder: Send + Sync + std::fmt::Debug {
    /// Forward `request`; never fails, errors become error responses.
    async fn forward(&self, request: Request<Body>) -> Response<Body>;
}

/// Shared forwarder for use across handlers.
pub type SharedForwarder = Arc<dyn Forwarder>;

/// Forwarder that injects the managed access token.
#[derive(Debug, Clone)]
pub struct UpstreamForwarder {
    client: Client,
    base_url: String,
    tokens: SharedTokenSource,
    max_body_size: usize,
}

impl UpstreamForwarder {
    /// Create a forwarder targeting `base_url`.
    pub fn new(client: Client, base_url: impl Into<String>, tokens: SharedTokenSource) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Set the maximum inbound body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Upstream origin requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Forwarder for UpstreamForwarder {
    async fn forward(&self, request: Request<Body>) -> Response<Body> {
        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "No access token available, not forwarding");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
            }
        };

        let (parts, body) = request.into_parts();
        let body = match axum::body::to_bytes(body, self.max_body_size).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Rejecting inbound body");
                return error_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
            }
        };

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path_and_query);

        let mut headers = strip_hop_by_hop(&parts.headers);
        headers.remove(header::HOST);
        let bearer = match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => value,
            Err(_) => {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "access token is not a valid header value",
                );
            }
        };
        headers.insert(header::AUTHORIZATION, bearer);

        debug!(method = %parts.method, path = parts.uri.path(), "Forwarding request upstream");
        let upstream = match self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, url = %url, "Proxy error");
                return bad_gateway();
            }
        };

        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers());
        let stream = upstream
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other));

        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Copy `headers` without connection-scoped entries.
///
/// Headers named in a `Connection` header are dropped too.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let connection_listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str()) || connection_listed.contains(name) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// 502 with no body; transport details stay in the logs.
fn bad_gateway() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
