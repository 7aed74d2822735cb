//! Login URL command - prints the authorization URL for a headless login.

use anyhow::{Context as _, Result};
use clap::Args;
use console::style;
use sonar_oauth::OAuthConfig;
use sonar_oauth::oauth::build_authorization_url;

use super::Context;

/// Arguments for the login-url command.
#[derive(Args, Debug)]
pub struct LoginUrlArgs {
    /// State to embed (overrides SPOTIFY_STATE)
    #[arg(long)]
    pub state: Option<String>,
}

/// Run the login-url command.
pub fn run(args: LoginUrlArgs, ctx: &Context) -> Result<()> {
    ctx.config.validate().context("incomplete configuration")?;

    let (state, generated) = match args.state {
        Some(state) => (state, false),
        None => ctx.callback_state(),
    };

    let creds = &ctx.config.credentials;
    let oauth = OAuthConfig::spotify(
        creds.client_id.clone(),
        creds.client_secret.clone(),
        creds.redirect_uri.clone(),
        creds.scopes.clone(),
    )
    .with_endpoints(
        ctx.config.upstream.authorize_url.clone(),
        ctx.config.upstream.token_url.clone(),
    );

    println!("{}", build_authorization_url(&oauth, &state));

    if generated {
        eprintln!();
        eprintln!(
            "{} no state is configured, so this URL carries a one-off state.",
            style("note:").yellow().bold()
        );
        eprintln!(
            "      The callback only succeeds on a server started with SPOTIFY_STATE={}",
            state
        );
    }
    Ok(())
}
