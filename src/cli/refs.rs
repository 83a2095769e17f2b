use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color};

use super::context::ensure_confirmed;
use super::Context;
use crate::forge::services::pipelines::short_hash;
use crate::forge::services::{Branch, Commit, Tag};
use crate::output::{self, bold, create_table, dim, truncate};

#[derive(Subcommand, Debug)]
pub enum BranchCommand {
    /// List branches
    #[command(alias = "ls")]
    List {
        #[arg(short = 'L', long, default_value_t = 100)]
        limit: usize,
    },
    /// Create a branch from another branch
    Create {
        name: String,

        /// Branch to start from (defaults to the project's default branch)
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Delete a branch
    Delete {
        name: String,

        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    /// List tags
    #[command(alias = "ls")]
    List {
        #[arg(short = 'L', long, default_value_t = 100)]
        limit: usize,
    },
    /// Tag a branch or commit
    Create {
        name: String,

        /// Branch or commit to tag
        #[arg(short, long)]
        target: String,

        /// Annotation message
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Delete a tag
    Delete {
        name: String,

        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CommitCommand {
    /// List commits on a branch
    #[command(alias = "ls")]
    List {
        #[arg(short, long)]
        branch: Option<String>,

        #[arg(short = 'L', long, default_value_t = 30)]
        limit: usize,
    },
    /// Show one commit
    View { hash: String },
}

pub async fn run_branch(ctx: &mut Context, command: &BranchCommand) -> Result<()> {
    let repo = ctx.repo().await?;
    let branches = ctx.client.branches(&repo);

    match command {
        BranchCommand::List { limit } => {
            let list = branches.list(&ctx.cancel, Some(*limit)).await?;
            ctx.emit(&list, |list| {
                print_branches(list);
                Ok(())
            })
        }
        BranchCommand::Create { name, from } => {
            let source = match from {
                Some(source) => source.clone(),
                None => {
                    let project = ctx.client.projects().get(&ctx.cancel, &repo).await?;
                    project.default_branch.unwrap_or_else(|| "master".to_string())
                }
            };
            branches.create(&ctx.cancel, name, &source).await?;
            output::success(format!("Created branch {} from {source}", bold(name)));
            Ok(())
        }
        BranchCommand::Delete { name, yes } => {
            ensure_confirmed(*yes, &format!("Delete branch {name} in {repo}?"))?;
            branches.delete(&ctx.cancel, name).await?;
            output::success(format!("Deleted branch {name}"));
            Ok(())
        }
    }
}

pub async fn run_tag(ctx: &mut Context, command: &TagCommand) -> Result<()> {
    let repo = ctx.repo().await?;
    let tags = ctx.client.tags(&repo);

    match command {
        TagCommand::List { limit } => {
            let list = tags.list(&ctx.cancel, Some(*limit)).await?;
            ctx.emit(&list, |list| {
                print_tags(list);
                Ok(())
            })
        }
        TagCommand::Create { name, target, message } => {
            tags.create(&ctx.cancel, name, target, message.as_deref()).await?;
            output::success(format!("Created tag {} at {target}", bold(name)));
            Ok(())
        }
        TagCommand::Delete { name, yes } => {
            ensure_confirmed(*yes, &format!("Delete tag {name} in {repo}?"))?;
            tags.delete(&ctx.cancel, name).await?;
            output::success(format!("Deleted tag {name}"));
            Ok(())
        }
    }
}

pub async fn run_commit(ctx: &mut Context, command: &CommitCommand) -> Result<()> {
    let repo = ctx.repo().await?;
    let commits = ctx.client.commits(&repo);

    match command {
        CommitCommand::List { branch, limit } => {
            let list = commits.list(&ctx.cancel, branch.as_deref(), Some(*limit)).await?;
            ctx.emit(&list, |list| {
                print_commits(list);
                Ok(())
            })
        }
        CommitCommand::View { hash } => {
            let commit = commits.get(&ctx.cancel, hash).await?;
            ctx.emit(&commit, |commit| {
                println!("{} {}", bold("commit"), commit.hash);
                match &commit.author_email {
                    Some(email) => println!("Author: {} <{email}>", commit.author_name),
                    None => println!("Author: {}", commit.author_name),
                }
                println!("Date:   {}", commit.created_at);
                println!();
                for line in commit.message.lines() {
                    println!("    {line}");
                }
                Ok(())
            })
        }
    }
}

fn print_branches(list: &[Branch]) {
    if list.is_empty() {
        println!("{}", dim("No branches"));
        return;
    }
    let mut table = create_table(&["NAME", "COMMIT", ""]);
    for branch in list {
        let default = if branch.is_default {
            Cell::new("default").fg(Color::Green)
        } else {
            Cell::new("")
        };
        table.add_row(vec![Cell::new(&branch.name), Cell::new(short_hash(&branch.hash)), default]);
    }
    println!("{table}");
}

fn print_tags(list: &[Tag]) {
    if list.is_empty() {
        println!("{}", dim("No tags"));
        return;
    }
    let mut table = create_table(&["NAME", "COMMIT", "MESSAGE", "CREATED"]);
    for tag in list {
        table.add_row(vec![
            Cell::new(&tag.name),
            Cell::new(short_hash(&tag.commit_id)),
            Cell::new(truncate(tag.message.as_deref().unwrap_or_default(), 50)),
            Cell::new(tag.created_at.short()),
        ]);
    }
    println!("{table}");
}

fn print_commits(list: &[Commit]) {
    if list.is_empty() {
        println!("{}", dim("No commits"));
        return;
    }
    let mut table = create_table(&["COMMIT", "MESSAGE", "AUTHOR", "DATE"]);
    for commit in list {
        table.add_row(vec![
            Cell::new(commit.short_hash()).fg(Color::Yellow),
            Cell::new(truncate(commit.summary(), 70)),
            Cell::new(&commit.author_name),
            Cell::new(commit.created_at.short()),
        ]);
    }
    println!("{table}");
}
