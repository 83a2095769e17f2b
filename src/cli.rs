use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::auth;
use crate::error;
use crate::output::{self, OutputFormat};

mod api;
mod auth_cmd;
mod browse;
mod context;
mod files;
mod issue;
mod mr;
mod pipeline;
mod project;
mod refs;
mod release;
mod status;
mod webhook;

pub use context::Context;

#[derive(Parser)]
#[command(name = "gf")]
#[command(author, version, about = "Work with GitFlic from the command line", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Repository as OWNER/PROJECT (defaults to the origin remote)
    #[arg(short = 'R', long, global = true)]
    pub repo: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// GitFlic host to talk to
    #[arg(long, global = true, env = "GF_HOST")]
    pub host: Option<String>,

    #[arg(long, global = true, env = "GF_TOKEN", hide = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Config file location
    #[arg(long, global = true, hide = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, check or remove stored credentials
    Auth {
        #[command(subcommand)]
        command: auth_cmd::AuthCommand,
    },
    /// Make an authenticated API request
    Api(api::ApiArgs),
    /// Show the current user, repository and branch
    Status,
    /// Open the repository in the browser
    Browse(browse::BrowseArgs),
    /// Work with merge requests
    #[command(alias = "pr")]
    Mr {
        #[command(subcommand)]
        command: mr::MrCommand,
    },
    /// Work with issues
    Issue {
        #[command(subcommand)]
        command: issue::IssueCommand,
    },
    /// Work with CI/CD pipelines
    #[command(alias = "ci")]
    Pipeline {
        #[command(subcommand)]
        command: pipeline::PipelineCommand,
    },
    /// Work with releases
    Release {
        #[command(subcommand)]
        command: release::ReleaseCommand,
    },
    /// Work with branches
    Branch {
        #[command(subcommand)]
        command: refs::BranchCommand,
    },
    /// Work with tags
    Tag {
        #[command(subcommand)]
        command: refs::TagCommand,
    },
    /// Browse commits
    Commit {
        #[command(subcommand)]
        command: refs::CommitCommand,
    },
    /// Browse and download repository files
    File {
        #[command(subcommand)]
        command: files::FileCommand,
    },
    /// Manage project webhooks
    Webhook {
        #[command(subcommand)]
        command: webhook::WebhookCommand,
    },
    /// Show projects
    Project {
        #[command(subcommand)]
        command: project::ProjectCommand,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let cancel = CancellationToken::new();
        spawn_signal_watcher(cancel.clone());

        let mut ctx = Context::new(&self.global, cancel)?;

        let result = match self.dispatch(&mut ctx).await {
            Err(err) if self.may_reauthenticate(&err) => {
                output::warning("The stored token was rejected by the server.");
                ctx.reauthenticate().await?;
                info!("Retrying command with the new token");
                self.dispatch(&mut ctx).await
            }
            result => result,
        };
        result.map_err(with_hint)
    }

    fn may_reauthenticate(&self, err: &anyhow::Error) -> bool {
        !matches!(self.command, Commands::Auth { .. })
            && error::is_token_invalid(err)
            && auth::can_prompt()
    }

    async fn dispatch(&self, ctx: &mut Context) -> Result<()> {
        match &self.command {
            Commands::Auth { command } => auth_cmd::run(ctx, command).await,
            Commands::Api(args) => api::run(ctx, args).await,
            Commands::Status => status::run(ctx).await,
            Commands::Browse(args) => browse::run(ctx, args).await,
            Commands::Mr { command } => mr::run(ctx, command).await,
            Commands::Issue { command } => issue::run(ctx, command).await,
            Commands::Pipeline { command } => pipeline::run(ctx, command).await,
            Commands::Release { command } => release::run(ctx, command).await,
            Commands::Branch { command } => refs::run_branch(ctx, command).await,
            Commands::Tag { command } => refs::run_tag(ctx, command).await,
            Commands::Commit { command } => refs::run_commit(ctx, command).await,
            Commands::File { command } => files::run(ctx, command).await,
            Commands::Webhook { command } => webhook::run(ctx, command).await,
            Commands::Project { command } => project::run(ctx, command).await,
        }
    }
}

/// Adds a next step to errors the user can usually fix themselves.
fn with_hint(err: anyhow::Error) -> anyhow::Error {
    let hint = if error::is_unauthorized(&err) || error::is_token_invalid(&err) {
        "run `gf auth login` to store a new token"
    } else if error::is_forbidden(&err) {
        "the token has no access to this resource"
    } else if error::is_not_found(&err) {
        "check the repository (--repo) and the id"
    } else {
        return err;
    };
    err.context(hint)
}

/// Cancels `cancel` on Ctrl-C or SIGTERM.
fn spawn_signal_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        debug!("Cancelling in-flight work");
        cancel.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => debug!("Received SIGINT"),
        _ = terminate => debug!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gf", "mr", "list", "-R", "acme/app", "--format", "json"]).unwrap();
        assert_eq!(cli.global.repo.as_deref(), Some("acme/app"));
        assert_eq!(cli.global.format, OutputFormat::Json);
    }

    #[test]
    fn rejects_unknown_merge_request_state() {
        assert!(Cli::try_parse_from(["gf", "mr", "list", "--state", "draft"]).is_err());
    }

    #[test]
    fn hints_keep_the_classification() {
        let err = with_hint(error::GfError::NotFound.into());
        assert!(error::is_not_found(&err));
        assert!(format!("{err:#}").contains("--repo"));

        let plain = with_hint(anyhow::anyhow!("boom"));
        assert_eq!(plain.to_string(), "boom");
    }

    #[test]
    fn watch_interval_is_numeric() {
        assert!(Cli::try_parse_from(["gf", "pipeline", "watch", "3", "--interval", "soon"]).is_err());
        assert!(Cli::try_parse_from(["gf", "pipeline", "watch", "3", "--interval", "5", "--exit-status"]).is_ok());
    }
}
