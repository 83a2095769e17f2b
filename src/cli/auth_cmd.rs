use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use std::io::Read;

use super::Context;
use crate::auth::{self, Token};
use crate::output::{self, bold, dim};

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Store an access token for the host
    Login {
        /// Read the token from standard input
        #[arg(long)]
        with_token: bool,
    },
    /// Show which account the token belongs to
    Status,
    /// Forget the stored token for the host
    Logout,
}

pub async fn run(ctx: &mut Context, command: &AuthCommand) -> Result<()> {
    match command {
        AuthCommand::Login { with_token } => login(ctx, *with_token).await,
        AuthCommand::Status => status(ctx).await,
        AuthCommand::Logout => logout(ctx),
    }
}

async fn login(ctx: &mut Context, with_token: bool) -> Result<()> {
    let token = if with_token {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read token from stdin")?;
        Token::from(raw)
    } else if auth::can_prompt() {
        auth::prompt_token(&ctx.host)?
    } else {
        bail!("No terminal to prompt on; pipe the token with --with-token");
    };

    if token.as_str().is_empty() {
        bail!("Empty token");
    }

    let user = ctx.login_with(token).await?;
    output::success(format!("Logged in to {} as {}", ctx.host, bold(&user)));
    Ok(())
}

async fn status(ctx: &mut Context) -> Result<()> {
    ctx.require_token()?;
    let me = ctx.client.users().me(&ctx.cancel).await?;
    let source = if ctx.token_from_env() { "GF_TOKEN" } else { "config file" };

    if ctx.format.is_machine() {
        return output::print_data(ctx.format, &me);
    }
    println!("{}", bold(&ctx.host));
    println!("  Logged in as {} ({})", bold(&me.username), me.display_name());
    println!("  Token from {}", dim(source));
    if let Some(protocol) = ctx.config().host(&ctx.host).map(|h| h.protocol.as_str()) {
        println!("  Git protocol {}", dim(protocol));
    }
    Ok(())
}

fn logout(ctx: &mut Context) -> Result<()> {
    let host = ctx.host.clone();
    if !ctx.config_mut().logout(&host) {
        output::warning(format!("Not logged in to {host}"));
        return Ok(());
    }
    ctx.save_config()?;
    output::success(format!("Logged out of {host}"));
    if ctx.token_from_env() {
        output::warning("GF_TOKEN is still set in the environment.");
    }
    Ok(())
}
