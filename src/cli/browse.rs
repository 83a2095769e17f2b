use anyhow::{Context as _, Result};
use clap::Args;
use log::debug;

use super::Context;

#[derive(Args, Debug)]
pub struct BrowseArgs {
    /// Open a merge request
    #[arg(long, value_name = "ID", conflicts_with_all = ["issue", "pipeline", "releases"])]
    pub mr: Option<u64>,

    /// Open an issue
    #[arg(long, value_name = "ID", conflicts_with_all = ["pipeline", "releases"])]
    pub issue: Option<u64>,

    /// Open a pipeline
    #[arg(long, value_name = "ID", conflicts_with = "releases")]
    pub pipeline: Option<u64>,

    /// Open the releases page
    #[arg(long)]
    pub releases: bool,

    /// Print the URL instead of opening it
    #[arg(short = 'n', long)]
    pub no_browser: bool,
}

impl BrowseArgs {
    fn suffix(&self) -> String {
        if let Some(id) = self.mr {
            format!("/merge-request/{id}")
        } else if let Some(id) = self.issue {
            format!("/issue/{id}")
        } else if let Some(id) = self.pipeline {
            format!("/cicd/pipeline/{id}")
        } else if self.releases {
            "/release".to_string()
        } else {
            String::new()
        }
    }
}

pub async fn run(ctx: &mut Context, args: &BrowseArgs) -> Result<()> {
    let repo = ctx.repo().await?;
    let url = ctx.web_url(&repo, &args.suffix());
    open_or_print(&url, args.no_browser)
}

/// Launches the browser on `url`, or prints it.
pub(super) fn open_or_print(url: &str, no_browser: bool) -> Result<()> {
    if no_browser {
        println!("{url}");
        return Ok(());
    }
    debug!("Opening {url}");
    open::that(url).with_context(|| format!("Failed to open {url}"))?;
    eprintln!("Opening {url} in your browser.");
    Ok(())
}
