use anyhow::Result;
use clap::Subcommand;
use comfy_table::Cell;

use super::browse::open_or_print;
use super::context::ensure_confirmed;
use super::Context;
use crate::error;
use crate::forge::services::{Issue, IssueFilter, NewIssue};
use crate::output::{self, bold, create_table, dim, state, state_cell, truncate};

#[derive(Subcommand, Debug)]
pub enum IssueCommand {
    /// List issues
    #[command(alias = "ls")]
    List {
        /// open, closed or all
        #[arg(short, long, default_value = "open")]
        state: IssueFilter,

        #[arg(short = 'L', long, default_value_t = 30)]
        limit: usize,
    },
    /// Show one issue
    View {
        id: u64,

        #[arg(short, long)]
        web: bool,
    },
    /// Open a new issue
    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Close an issue
    Close { id: u64 },
    /// Reopen a closed issue
    Reopen { id: u64 },
    /// Delete an issue
    Delete {
        id: u64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn run(ctx: &mut Context, command: &IssueCommand) -> Result<()> {
    let repo = ctx.repo().await?;
    let issues = ctx.client.issues(&repo);

    match command {
        IssueCommand::List { state, limit } => {
            let list = issues.list(&ctx.cancel, *state, Some(*limit)).await?;
            ctx.emit(&list, |list| {
                print_list(list, *state);
                Ok(())
            })
        }
        IssueCommand::View { id, web } => {
            if *web {
                return open_or_print(&ctx.web_url(&repo, &format!("/issue/{id}")), false);
            }
            let issue = issues.get(&ctx.cancel, *id).await?;
            ctx.emit(&issue, |issue| {
                print_detail(issue);
                Ok(())
            })
        }
        IssueCommand::Create { title, description } => {
            let new = NewIssue {
                title: title.clone(),
                description: description.clone(),
            };
            let issue = issues.create(&ctx.cancel, &new).await?;
            output::success(format!("Created issue #{}", issue.local_id));
            println!("{}", ctx.web_url(&repo, &format!("/issue/{}", issue.local_id)));
            Ok(())
        }
        IssueCommand::Close { id } => {
            issues.close(&ctx.cancel, *id).await?;
            output::success(format!("Closed issue #{id}"));
            Ok(())
        }
        IssueCommand::Reopen { id } => {
            issues.reopen(&ctx.cancel, *id).await?;
            output::success(format!("Reopened issue #{id}"));
            Ok(())
        }
        IssueCommand::Delete { id, yes } => {
            ensure_confirmed(*yes, &format!("Delete issue #{id} in {repo}?"))?;
            match issues.delete(&ctx.cancel, *id).await {
                Ok(()) => {
                    output::success(format!("Deleted issue #{id}"));
                    Ok(())
                }
                Err(err) => {
                    let err = anyhow::Error::from(err);
                    if error::is_method_not_allowed(&err) {
                        output::warning(format!(
                            "This server does not allow deleting issues; use `gf issue close {id}` instead."
                        ));
                    }
                    Err(err)
                }
            }
        }
    }
}

fn print_list(list: &[Issue], filter: IssueFilter) {
    if list.is_empty() {
        println!("{}", dim(format!("No {filter} issues")));
        return;
    }
    let mut table = create_table(&["ID", "TITLE", "STATE", "AUTHOR", "UPDATED"]);
    for issue in list {
        table.add_row(vec![
            Cell::new(format!("#{}", issue.local_id)),
            Cell::new(truncate(&issue.title, 70)),
            state_cell(issue.state().as_str()),
            Cell::new(issue.author.as_ref().map(|a| a.username.as_str()).unwrap_or("-")),
            Cell::new(issue.updated_at.short()),
        ]);
    }
    println!("{table}");
}

fn print_detail(issue: &Issue) {
    println!("{} {}", bold(&issue.title), dim(format!("#{}", issue.local_id)));
    let author = issue.author.as_ref().map(|a| a.display_name()).unwrap_or_else(|| "-".into());
    println!("{} opened by {author} on {}", state(issue.state().as_str()), issue.created_at.short());
    if !issue.assigned_users.is_empty() {
        let assignees: Vec<&str> = issue.assigned_users.iter().map(|u| u.username.as_str()).collect();
        println!("{} {}", dim("assigned to"), assignees.join(", "));
    }
    if let Some(description) = issue.description.as_deref().filter(|d| !d.trim().is_empty()) {
        println!("\n{description}");
    }
}
