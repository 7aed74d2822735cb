//! Current track and queue views.

use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use sonar_oauth::PlayerQueue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::error::Result;
use crate::state::AppState;

/// `GET /current-track`: the playing item, the last played one, or 204.
///
/// The inbound query string is passed to the upstream player request.
pub async fn current_track_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let token = state.tokens.access_token().await?;
    let track = state
        .nowplaying
        .current_or_recent_track(&token, query.as_deref())
        .await?;

    Ok(match track {
        Some(track) => Json(track).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// `GET /queue`: the upstream queue, smoothed by the snapshot.
pub async fn queue_handler(State(state): State<AppState>) -> Result<Json<PlayerQueue>> {
    let token = state.tokens.access_token().await?;
    let queue = state
        .nowplaying
        .queue(&token, state.config.queue_snapshot_interval)
        .await?;
    Ok(Json(queue))
}

/// Create the now-playing routes with CORS for `origins`.
pub fn nowplaying_routes(origins: &[String]) -> Router<AppState> {
    Router::new()
        .route("/current-track", get(current_track_handler))
        .route("/queue", get(queue_handler))
        .layer(cors_layer(origins))
}

/// CORS for browser widgets. An empty list allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
