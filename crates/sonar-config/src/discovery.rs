//! Config file discovery and layered loading.
//!
//! Resolution order (later overrides earlier):
//! 1. Built-in defaults
//! 2. One TOML file: the explicit `--config` path, else `./sonar.toml`,
//!    else `~/.config/sonar/config.toml`
//! 3. `.env` in the working directory (never overrides variables already set)
//! 4. Process environment

use std::path::{Path, PathBuf};

use crate::env::apply_env;
use crate::{ConfigError, Result, SonarConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "sonar.toml";

/// Default config filename within the XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "sonar";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "SONAR_CONFIG_DIR";

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: SonarConfig,
    /// File the TOML layer came from, if any.
    pub source: Option<PathBuf>,
    /// Warnings generated during loading (e.g., plaintext secrets).
    pub warnings: Vec<String>,
}

/// Load configuration from every layer, reading overrides from the process
/// environment after applying `.env`.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let mut dotenv_warning = None;
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        dotenv_warning = Some(format!("Failed to load .env: {}", e));
    }

    let mut loaded =
        load_config_with_options(explicit, None, None, |name| std::env::var(name).ok())?;
    loaded.warnings.extend(dotenv_warning);
    Ok(loaded)
}

/// Load configuration with explicit control over search directories and the
/// environment lookup.
///
/// `project_dir` replaces the working directory when looking for
/// `sonar.toml`; `config_dir` replaces the XDG directory.
pub fn load_config_with_options<F>(
    explicit: Option<&Path>,
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    lookup: F,
) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut warnings = Vec::new();

    let (mut config, source) = match explicit {
        // An explicit path must exist and parse.
        Some(path) => (load_config_file(path)?, Some(path.to_path_buf())),
        None => {
            let project_path = project_dir
                .map(|d| d.join(PROJECT_CONFIG_FILE))
                .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
            let user_path = match config_dir {
                Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
                None => xdg_config_path(),
            };

            let candidate = std::iter::once(project_path)
                .chain(user_path)
                .find(|p| p.is_file());
            match candidate {
                Some(path) => (load_config_file(&path)?, Some(path)),
                None => (SonarConfig::new(), None),
            }
        }
    };

    check_plaintext_secrets(&config, source.as_deref(), &mut warnings);
    apply_env(&mut config, lookup)?;

    Ok(LoadedConfig {
        config,
        source,
        warnings,
    })
}

/// Load config from a specific file path (no discovery, no environment).
pub fn load_config_file(path: &Path) -> Result<SonarConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    SonarConfig::from_toml(&contents)
}

/// Get the XDG config file path for sonar.
///
/// Checks `SONAR_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for sonar.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

fn check_plaintext_secrets(config: &SonarConfig, source: Option<&Path>, warnings: &mut Vec<String>) {
    let Some(path) = source else {
        return;
    };
    if !config.credentials.client_secret.is_empty() {
        warnings.push(format!(
            "{} contains a plaintext client_secret. \
             Consider setting SPOTIFY_CLIENT_SECRET in the environment instead.",
            path.display()
        ));
    }
    if config.credentials.refresh_token.is_some() {
        warnings.push(format!(
            "{} contains a plaintext refresh_token. \
             Consider setting SPOTIFY_REFRESH_TOKEN in the environment instead.",
            path.display()
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
