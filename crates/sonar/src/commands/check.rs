//! Check command - validates configuration and prints a summary.

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use sonar_config::redact;

use super::Context;

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Allow-list to validate (default: the configured routes file)
    #[arg(long)]
    pub routes: Option<std::path::PathBuf>,
}

/// Run the check command.
pub fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let dim = Style::new().dim();

    println!();
    println!("{}", style("Sonar Configuration").bold());
    println!("{}", dim.apply_to("─".repeat(40)));

    let source = ctx
        .source
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults and environment only)".to_string());
    println!("  {} {}", dim.apply_to("Config file:"), source);
    println!("  {} {}", dim.apply_to("Access:"), config.server.access_addr());
    println!("  {} {}", dim.apply_to("Proxy:"), config.server.proxy_addr());
    println!("  {} {}", dim.apply_to("Now playing:"), config.server.nowplaying_addr());
    println!("  {} {}", dim.apply_to("Upstream:"), config.upstream.api_base);

    let creds = &config.credentials;
    println!("  {} {}", dim.apply_to("Client ID:"), creds.client_id);
    println!("  {} {}", dim.apply_to("Client secret:"), redact(&creds.client_secret));
    println!("  {} {}", dim.apply_to("Redirect URI:"), creds.redirect_uri);
    println!("  {} {}", dim.apply_to("Scopes:"), creds.scopes.join(" "));
    println!(
        "  {} {}",
        dim.apply_to("Refresh token:"),
        creds
            .refresh_token
            .as_deref()
            .map(redact)
            .unwrap_or_else(|| "(none, browser login required)".to_string())
    );

    if ctx.verbose {
        println!("  {} {}s", dim.apply_to("Timeout:"), config.upstream.timeout_secs);
        println!(
            "  {} {}s",
            dim.apply_to("Queue interval:"),
            config.nowplaying.queue_snapshot_interval_secs
        );
        println!("  {} {:?}", dim.apply_to("CORS origins:"), config.server.cors_origins);
    }

    let routes_file = args.routes.unwrap_or_else(|| config.proxy.routes_file.clone());
    let routes = sonar_config::load_proxy_routes(&routes_file)
        .with_context(|| format!("invalid routes file {}", routes_file.display()))?;
    let mode = match &routes {
        Some(r) if !r.routes.is_empty() => format!("{} allow-listed routes", r.routes.len()),
        _ => "forwarding every path".to_string(),
    };
    println!("  {} {}", dim.apply_to("Proxy mode:"), mode);

    for warning in &ctx.warnings {
        println!("  {} {}", style("warning:").yellow(), warning);
    }
    println!();

    config.validate().context("incomplete configuration")?;
    println!("{}", style("Configuration OK").green());
    Ok(())
}
