//! Sonar - authenticating proxy for the Spotify Web API
//!
//! Main entry point for the Sonar CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{check, login_url, start};

/// Crates whose log level follows `LOG_LEVEL` / `--verbose`.
const LOG_TARGETS: &[&str] = &[
    "sonar",
    "sonar_server",
    "sonar_oauth",
    "sonar_config",
    "sonar_cache",
];

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Sonar - authenticating proxy for the Spotify Web API
#[derive(Parser)]
#[command(name = "sonar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: ./sonar.toml, then ~/.config/sonar/config.toml)
    #[arg(short, long, global = true, env = "SONAR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the access, proxy and now-playing listeners
    Start(start::StartArgs),

    /// Print the authorization URL for a browser login
    LoginUrl(login_url::LoginUrlArgs),

    /// Validate configuration and the proxy allow-list
    Check(check::CheckArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = sonar_config::load_config(cli.config.as_deref())
        .context("failed to load configuration")?;

    // Console (human-readable, stderr) + rotating JSON file
    let console_filter = console_filter(&loaded.config.logging.level, cli.verbose)?;
    let log_dir = loaded
        .config
        .logging
        .directory
        .clone()
        .or_else(|| sonar_config::xdg_config_dir().map(|d| d.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"));
    // Console only when the log directory cannot be used
    let (file_writer, _guard, file_error) = match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("sonar")
        .filename_suffix("log")
        .build(&log_dir)
    {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::new(targets_at("trace", "info")))
        }))
        .init();

    if let Some(e) = file_error {
        tracing::warn!(
            path = %log_dir.display(),
            error = %e,
            "Log directory unusable, logging to the console only"
        );
    }

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    if let Some(source) = &loaded.source {
        tracing::debug!(path = %source.display(), "Loaded config file");
    }

    let ctx = commands::Context {
        config: loaded.config,
        source: loaded.source,
        warnings: loaded.warnings,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, ctx).await,
        Commands::LoginUrl(args) => login_url::run(args, &ctx),
        Commands::Check(args) => check::run(args, &ctx),
    }
}

/// Build the console filter from `LOG_LEVEL`.
///
/// A bare level applies to the sonar crates only; anything else is used as a
/// full `EnvFilter` directive.
fn console_filter(level: &str, verbose: bool) -> Result<EnvFilter> {
    if verbose {
        return Ok(EnvFilter::new(targets_at("debug", "info")));
    }
    let level = level.trim().to_ascii_lowercase();
    let directive = match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => targets_at(&level, "warn"),
        _ => level,
    };
    EnvFilter::try_new(&directive).with_context(|| format!("invalid LOG_LEVEL '{}'", directive))
}

fn targets_at(level: &str, rest: &str) -> String {
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    directives.push(rest.to_string());
    directives.join(",")
}
