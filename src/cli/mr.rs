use anyhow::{Context as _, Result};
use clap::Subcommand;
use comfy_table::Cell;

use super::browse::open_or_print;
use super::Context;
use crate::forge::services::{MergeRequest, MergeRequestFilter, NewMergeRequest};
use crate::gitremote;
use crate::output::{self, bold, create_table, cyan, dim, state, state_cell, truncate, Spinner};

#[derive(Subcommand, Debug)]
pub enum MrCommand {
    /// List merge requests
    #[command(alias = "ls")]
    List {
        /// open, merged, closed or all
        #[arg(short, long, default_value = "open")]
        state: MergeRequestFilter,

        #[arg(short = 'L', long, default_value_t = 30)]
        limit: usize,
    },
    /// Show one merge request
    View {
        id: u64,

        /// Open in the browser instead
        #[arg(short, long)]
        web: bool,
    },
    /// Open a merge request from a branch
    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Source branch (defaults to the current branch)
        #[arg(short = 's', long)]
        source: Option<String>,

        /// Target branch (defaults to the project's default branch)
        #[arg(short = 'b', long)]
        target: Option<String>,

        /// Delete the source branch after merging
        #[arg(long)]
        remove_source_branch: bool,
    },
    /// Merge a merge request
    Merge { id: u64 },
    /// Close a merge request without merging
    Close { id: u64 },
}

pub async fn run(ctx: &mut Context, command: &MrCommand) -> Result<()> {
    let repo = ctx.repo().await?;
    let mrs = ctx.client.merge_requests(&repo);

    match command {
        MrCommand::List { state, limit } => {
            let spinner = Spinner::start(format!("Fetching {state} merge requests"));
            let list = mrs.list(&ctx.cancel, *state, Some(*limit)).await;
            spinner.clear();
            let list = list?;
            ctx.emit(&list, |list| {
                print_list(list, *state);
                Ok(())
            })
        }
        MrCommand::View { id, web } => {
            if *web {
                return open_or_print(&ctx.web_url(&repo, &format!("/merge-request/{id}")), false);
            }
            let mr = mrs.get(&ctx.cancel, *id).await?;
            ctx.emit(&mr, |mr| {
                print_detail(mr);
                Ok(())
            })
        }
        MrCommand::Create {
            title,
            description,
            source,
            target,
            remove_source_branch,
        } => {
            let source_branch = match source {
                Some(branch) => branch.clone(),
                None => gitremote::current_branch().await.context("Pass --source; no current branch")?,
            };
            let target_branch = match target {
                Some(branch) => branch.clone(),
                None => {
                    let project = ctx.client.projects().get(&ctx.cancel, &repo).await?;
                    project.default_branch.unwrap_or_else(|| "master".to_string())
                }
            };
            let new = NewMergeRequest {
                title: title.clone(),
                description: description.clone(),
                source_branch,
                target_branch,
                remove_source_branch: *remove_source_branch,
            };
            let mr = mrs.create(&ctx.cancel, &new).await?;
            output::success(format!(
                "Created merge request !{} {} → {}",
                mr.local_id, new.source_branch, new.target_branch
            ));
            println!("{}", ctx.web_url(&repo, &format!("/merge-request/{}", mr.local_id)));
            Ok(())
        }
        MrCommand::Merge { id } => {
            mrs.merge(&ctx.cancel, *id).await?;
            output::success(format!("Merged merge request !{id}"));
            Ok(())
        }
        MrCommand::Close { id } => {
            mrs.close(&ctx.cancel, *id).await?;
            output::success(format!("Closed merge request !{id}"));
            Ok(())
        }
    }
}

fn print_list(list: &[MergeRequest], filter: MergeRequestFilter) {
    if list.is_empty() {
        println!("{}", dim(format!("No {filter} merge requests")));
        return;
    }
    let mut table = create_table(&["ID", "TITLE", "BRANCH", "STATE", "AUTHOR", "UPDATED"]);
    for mr in list {
        table.add_row(vec![
            Cell::new(format!("!{}", mr.local_id)),
            Cell::new(truncate(&mr.title, 60)),
            Cell::new(format!("{} → {}", mr.source_branch.name(), mr.target_branch.name())),
            state_cell(mr.state().as_str()),
            Cell::new(mr.author.as_ref().map(|a| a.username.as_str()).unwrap_or("-")),
            Cell::new(mr.updated_at.short()),
        ]);
    }
    println!("{table}");
}

fn print_detail(mr: &MergeRequest) {
    println!("{} {}", bold(&mr.title), dim(format!("!{}", mr.local_id)));
    println!(
        "{} {} wants to merge {} into {}",
        state(mr.state().as_str()),
        mr.author.as_ref().map(|a| a.display_name()).unwrap_or_else(|| "someone".into()),
        cyan(mr.source_branch.name()),
        cyan(mr.target_branch.name())
    );
    if mr.has_conflicts {
        println!("{}", state("conflicts"));
    }
    println!("{}", dim(format!("created {}, updated {}", mr.created_at.short(), mr.updated_at.short())));
    if let Some(description) = mr.description.as_deref().filter(|d| !d.trim().is_empty()) {
        println!("\n{description}");
    }
}
