//! CLI command handlers.

pub mod check;
pub mod login_url;
pub mod start;

use std::path::PathBuf;

use sonar_config::SonarConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Layered configuration (file, `.env`, environment).
    pub config: SonarConfig,
    /// Config file the settings came from, if any.
    pub source: Option<PathBuf>,
    /// Warnings raised while loading.
    pub warnings: Vec<String>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// The configured callback state, or a freshly generated one.
    ///
    /// The flag is `true` when the value was generated.
    pub fn callback_state(&self) -> (String, bool) {
        match self.config.credentials.state.as_deref() {
            Some(state) if !state.is_empty() => (state.to_string(), false),
            _ => (sonar_oauth::oauth::generate_state(), true),
        }
    }
}
