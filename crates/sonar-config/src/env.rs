//! Environment variable overrides.
//!
//! Variable names match existing deployments so a `.env` file written for
//! them keeps working.

use std::str::FromStr;

use crate::error::{ConfigError, Result};
use crate::types::SonarConfig;

pub const ACCESS_PORT: &str = "ACCESS_PORT";
pub const PROXY_PORT: &str = "PROXY_PORT";
pub const NOWPLAYING_PORT: &str = "NOWPLAYING_PORT";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const TRUSTED_PROXIES: &str = "TRUSTED_PROXIES";
pub const CORS_ORIGINS: &str = "CORS_ORIGINS";
pub const API_BASE: &str = "SPOTIFY_API_BASE";
pub const CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";
pub const STATE: &str = "SPOTIFY_STATE";
pub const SCOPE: &str = "SPOTIFY_SCOPE";
pub const REFRESH_TOKEN: &str = "SPOTIFY_REFRESH_TOKEN";
pub const REFRESH_TOKEN_OUTPUT: &str = "SPOTIFY_REFRESH_TOKEN_OUTPUT";

/// Apply overrides from the process environment.
pub fn apply_process_env(config: &mut SonarConfig) -> Result<()> {
    apply_env(config, |name| std::env::var(name).ok())
}

/// Apply overrides from `lookup`. Unset or empty variables leave the
/// existing value alone.
pub fn apply_env<F>(config: &mut SonarConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ACCESS_PORT) {
        config.server.access_port = parse(ACCESS_PORT, &v)?;
    }
    if let Some(v) = get(PROXY_PORT) {
        config.server.proxy_port = parse(PROXY_PORT, &v)?;
    }
    if let Some(v) = get(NOWPLAYING_PORT) {
        config.server.nowplaying_port = parse(NOWPLAYING_PORT, &v)?;
    }
    if let Some(v) = get(LOG_LEVEL) {
        config.logging.level = v;
    }
    if let Some(v) = get(TRUSTED_PROXIES) {
        config.server.trusted_proxies = split_list(&v);
    }
    if let Some(v) = get(CORS_ORIGINS) {
        config.server.cors_origins = split_list(&v);
    }
    if let Some(v) = get(API_BASE) {
        config.upstream.api_base = v;
    }
    if let Some(v) = get(CLIENT_ID) {
        config.credentials.client_id = v;
    }
    if let Some(v) = get(CLIENT_SECRET) {
        config.credentials.client_secret = v;
    }
    if let Some(v) = get(REDIRECT_URI) {
        config.credentials.redirect_uri = v;
    }
    if let Some(v) = get(STATE) {
        config.credentials.state = Some(v);
    }
    if let Some(v) = get(SCOPE) {
        config.credentials.scopes = split_list(&v);
    }
    if let Some(v) = get(REFRESH_TOKEN) {
        config.credentials.refresh_token = Some(v);
    }
    if let Some(v) = get(REFRESH_TOKEN_OUTPUT) {
        config.credentials.refresh_token_output = parse_bool(REFRESH_TOKEN_OUTPUT, &v)?;
    }

    Ok(())
}

fn parse<T>(var: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(var: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Split a comma-separated list, dropping empty items.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
