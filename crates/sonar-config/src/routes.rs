//! Proxy allow-list loaded from YAML.
//!
//! ```yaml
//! routes:
//!   - path: /v1/me/player
//!     methods: [GET]
//!   - path: /v1/artists/:id
//!     methods: [GET]
//! ```
//!
//! Paths may use `:name` segment parameters and a trailing `*name` wildcard.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Methods a route may list.
pub const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"];

/// A single allowed path and its methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRoute {
    pub path: String,
    #[serde(default)]
    pub methods: Vec<String>,
}

impl ProxyRoute {
    /// The path in axum's `{param}` / `{*rest}` syntax.
    pub fn router_path(&self) -> String {
        self.path
            .split('/')
            .map(|segment| {
                if let Some(name) = segment.strip_prefix(':') {
                    format!("{{{}}}", name)
                } else if let Some(name) = segment.strip_prefix('*') {
                    format!("{{*{}}}", name)
                } else {
                    segment.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// The full allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRoutesConfig {
    #[serde(default)]
    pub routes: Vec<ProxyRoute>,
}

impl ProxyRoutesConfig {
    /// Parse and validate from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: ProxyRoutesConfig = serde_yaml::from_str(yaml)?;
        config.normalize_and_validate()?;
        Ok(config)
    }

    fn normalize_and_validate(&mut self) -> Result<()> {
        for (index, route) in self.routes.iter_mut().enumerate() {
            let path = route.path.trim();
            if path.is_empty() {
                return Err(invalid(index, "path is required"));
            }
            if !path.starts_with('/') {
                return Err(invalid(index, format!("path '{}' must start with '/'", path)));
            }
            route.path = path.to_string();

            if route.methods.is_empty() {
                return Err(invalid(index, "at least one method is required"));
            }
            for method in route.methods.iter_mut() {
                let upper = method.trim().to_ascii_uppercase();
                if !ALLOWED_METHODS.contains(&upper.as_str()) {
                    return Err(invalid(
                        index,
                        format!(
                            "method '{}' is not one of {}",
                            method,
                            ALLOWED_METHODS.join(" ")
                        ),
                    ));
                }
                *method = upper;
            }
        }
        Ok(())
    }
}

fn invalid(index: usize, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidRoute {
        index,
        reason: reason.into(),
    }
}

/// Load the allow-list at `path`.
///
/// Returns `Ok(None)` when the file does not exist, meaning every path is
/// forwarded.
pub fn load_proxy_routes(path: &Path) -> Result<Option<ProxyRoutesConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    ProxyRoutesConfig::from_yaml(&contents).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_routes() {
        let config = ProxyRoutesConfig::from_yaml(
            r#"
routes:
  - path: /v1/me/player
    methods: [GET, put]
  - path: /v1/me/player/queue
    methods:
      - POST
"#,
        )
        .unwrap();

        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].methods, vec!["GET", "PUT"]);
        assert_eq!(config.routes[1].path, "/v1/me/player/queue");
    }

    #[test]
    fn test_missing_path_rejected() {
        let err = ProxyRoutesConfig::from_yaml("routes:\n  - path: \"\"\n    methods: [GET]\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoute { index: 0, .. }));
    }

    #[test]
    fn test_empty_methods_rejected() {
        let err = ProxyRoutesConfig::from_yaml(
            "routes:\n  - path: /a\n    methods: [GET]\n  - path: /b\n    methods: []\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoute { index: 1, .. }));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = ProxyRoutesConfig::from_yaml("routes:\n  - path: /a\n    methods: [HEAD]\n")
            .unwrap_err();
        assert!(err.to_string().contains("HEAD"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = ProxyRoutesConfig::from_yaml("routes: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml(_)));
    }

    #[test]
    fn test_router_path_conversion() {
        let route = ProxyRoute {
            path: "/v1/artists/:id/albums/*rest".to_string(),
            methods: vec!["GET".to_string()],
        };
        assert_eq!(route.router_path(), "/v1/artists/{id}/albums/{*rest}");

        let plain = ProxyRoute {
            path: "/v1/me".to_string(),
            methods: vec!["GET".to_string()],
        };
        assert_eq!(plain.router_path(), "/v1/me");
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = load_proxy_routes(&dir.path().join("proxy-routes.yaml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proxy-routes.yaml");
        fs::write(&path, "routes:\n  - path: /v1/me\n    methods: [GET]\n").unwrap();

        let loaded = load_proxy_routes(&path).unwrap().unwrap();
        assert_eq!(loaded.routes[0].path, "/v1/me");
    }
}
