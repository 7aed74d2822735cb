//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to parse YAML.
    #[error("failed to parse routes file: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    /// Missing required field.
    #[error("missing required setting '{field}' (env: {env_var})")]
    MissingField { field: String, env_var: String },

    /// Environment variable could not be parsed.
    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },

    /// Proxy route failed validation.
    #[error("invalid proxy route #{index}: {reason}")]
    InvalidRoute { index: usize, reason: String },
}
