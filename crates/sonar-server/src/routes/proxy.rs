//! Forwarding listener routes.
//!
//! With an allow-list, only listed paths and methods are forwarded and
//! everything else gets axum's 404/405. Without one, every request is
//! forwarded.

use std::collections::BTreeMap;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::{MethodFilter, on},
};
use sonar_config::ProxyRoutesConfig;
use tracing::{debug, warn};

use crate::state::AppState;

/// Forward the request upstream with the managed token.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.forwarder.forward(request).await
}

/// Create the forwarding routes.
pub fn proxy_routes(allow_list: Option<&ProxyRoutesConfig>) -> Router<AppState> {
    let Some(allow_list) = allow_list.filter(|r| !r.routes.is_empty()) else {
        debug!("No proxy allow-list, forwarding every path");
        return Router::new().fallback(proxy_handler);
    };

    // Merge duplicate paths so each is registered once.
    let mut filters: BTreeMap<String, MethodFilter> = BTreeMap::new();
    for route in &allow_list.routes {
        for method in &route.methods {
            let Some(filter) = method_filter(method) else {
                warn!(method = %method, path = %route.path, "Skipping unsupported method");
                continue;
            };
            filters
                .entry(route.router_path())
                .and_modify(|f| *f = f.or(filter))
                .or_insert(filter);
        }
    }

    filters
        .into_iter()
        .fold(Router::new(), |router, (path, filter)| {
            debug!(path = %path, "Allowing proxied route");
            router.route(&path, on(filter, proxy_handler))
        })
}

fn method_filter(method: &str) -> Option<MethodFilter> {
    match method {
        "GET" => Some(MethodFilter::GET),
        "POST" => Some(MethodFilter::POST),
        "PUT" => Some(MethodFilter::PUT),
        "DELETE" => Some(MethodFilter::DELETE),
        "PATCH" => Some(MethodFilter::PATCH),
        "OPTIONS" => Some(MethodFilter::OPTIONS),
        _ => None,
    }
}
