//! Login and OAuth callback endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Query string the accounts service appends to the redirect URI.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user denied access.
    pub error: Option<String>,
}

/// Successful callback response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: String,
}

/// `GET /` sends visitors to the login flow.
pub async fn index_handler() -> Redirect {
    Redirect::temporary("/auth/login")
}

/// `GET /auth/login` redirects to the upstream authorization page.
pub async fn login_handler(State(state): State<AppState>) -> Redirect {
    let url = state
        .credentials
        .authorization_url(&state.config.expected_state);
    Redirect::temporary(&url)
}

/// `GET /auth/callback` validates the state and exchanges the code.
///
/// The state check runs before any network call.
pub async fn callback_handler(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>> {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        if let Some(reason) = query.error {
            warn!(reason = %reason, "Authorization was denied upstream");
        }
        return Err(ServerError::MissingCode);
    };

    if query.state.as_deref() != Some(state.config.expected_state.as_str()) {
        warn!("Callback state mismatch, refusing token exchange");
        return Err(ServerError::StateMismatch);
    }

    let pair = state.credentials.complete_authorization(&code).await?;
    info!("Login completed");

    if state.config.refresh_token_output {
        println!("Refresh token: {}", pair.refresh_token);
        println!("Set SPOTIFY_REFRESH_TOKEN to this value to skip the browser login on restart.");
    }

    Ok(Json(CallbackResponse {
        status: "authenticated".to_string(),
    }))
}

/// Create login and callback routes.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index_handler))
        .route("/auth/login", get(login_handler))
        .route("/auth/callback", get(callback_handler))
}
