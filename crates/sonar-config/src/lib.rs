//! Configuration for the Sonar proxy.
//!
//! Provides layered configuration:
//! - Built-in defaults for every setting
//! - An optional TOML file (`--config`, `./sonar.toml`, or the XDG config dir)
//! - A `.env` file and the process environment, using the variable names of
//!   existing deployments (`SPOTIFY_CLIENT_ID`, `ACCESS_PORT`, ...)
//!
//! The proxy allow-list is a separate YAML file loaded by [`routes`].

pub mod discovery;
pub mod env;
pub mod error;
pub mod routes;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, xdg_config_dir,
    xdg_config_path,
};
pub use env::{apply_env, apply_process_env};
pub use error::{ConfigError, Result};
pub use routes::{ALLOWED_METHODS, ProxyRoute, ProxyRoutesConfig, load_proxy_routes};
pub use types::*;
