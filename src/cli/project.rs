use anyhow::Result;
use clap::Subcommand;
use comfy_table::Cell;

use super::browse::open_or_print;
use super::Context;
use crate::forge::services::Project;
use crate::output::{bold, create_table, cyan, dim, truncate};

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Show the current project
    View {
        #[arg(short, long)]
        web: bool,
    },
    /// List your projects
    #[command(alias = "ls")]
    List {
        #[arg(short = 'L', long, default_value_t = 30)]
        limit: usize,
    },
}

pub async fn run(ctx: &mut Context, command: &ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::View { web } => {
            let repo = ctx.repo().await?;
            if *web {
                return open_or_print(&ctx.web_url(&repo, ""), false);
            }
            let project = ctx.client.projects().get(&ctx.cancel, &repo).await?;
            ctx.emit(&project, |project| {
                print_detail(project);
                Ok(())
            })
        }
        ProjectCommand::List { limit } => {
            let list = ctx.client.projects().list_mine(&ctx.cancel, Some(*limit)).await?;
            ctx.emit(&list, |list| {
                print_list(list);
                Ok(())
            })
        }
    }
}

fn print_detail(project: &Project) {
    println!("{} {}", bold(project.full_name()), dim(project.visibility()));
    if let Some(description) = project.description.as_deref().filter(|d| !d.trim().is_empty()) {
        println!("{description}");
    }
    println!();
    if let Some(branch) = &project.default_branch {
        println!("{:<16} {}", "Default branch", cyan(branch));
    }
    if let Some(language) = &project.language {
        println!("{:<16} {language}", "Language");
    }
    if let Some(url) = &project.http_transport_url {
        println!("{:<16} {url}", "Clone (https)");
    }
    if let Some(url) = &project.ssh_transport_url {
        println!("{:<16} {url}", "Clone (ssh)");
    }
    println!("{:<16} {}", "Updated", project.updated_at.short());
}

fn print_list(list: &[Project]) {
    if list.is_empty() {
        println!("{}", dim("No projects"));
        return;
    }
    let mut table = create_table(&["PROJECT", "VISIBILITY", "DESCRIPTION", "UPDATED"]);
    for project in list {
        table.add_row(vec![
            Cell::new(project.full_name()),
            Cell::new(project.visibility()),
            Cell::new(truncate(project.description.as_deref().unwrap_or_default(), 50)),
            Cell::new(project.updated_at.short()),
        ]);
    }
    println!("{table}");
}
