use anyhow::{bail, Result};
use clap::Subcommand;
use comfy_table::Cell;
use console::Term;
use tokio_util::sync::CancellationToken;

use super::browse::open_or_print;
use super::Context;
use crate::forge::services::{Job, Pipeline, Pipelines};
use crate::output::{self, create_table, dim, duration_cell, run_status_label, state_cell};
use crate::watch::{self, WatchOptions};

#[derive(Subcommand, Debug)]
pub enum PipelineCommand {
    /// List recent pipelines
    #[command(alias = "ls")]
    List {
        #[arg(short = 'L', long, default_value_t = 20)]
        limit: usize,
    },
    /// Show a pipeline and its jobs (the latest by default)
    View {
        id: Option<u64>,

        #[arg(short, long)]
        web: bool,
    },
    /// List the jobs of a pipeline
    Jobs { id: u64 },
    /// Follow a pipeline until it finishes
    Watch {
        /// Pipeline to watch (the latest by default)
        id: Option<u64>,

        /// Seconds between refreshes
        #[arg(short, long, default_value_t = 3, allow_negative_numbers = true)]
        interval: i64,

        /// Exit with 1 if the pipeline does not succeed
        #[arg(long)]
        exit_status: bool,
    },
    /// Cancel a running pipeline
    Cancel { id: u64 },
    /// Run a pipeline again
    Restart { id: u64 },
}

pub async fn run(ctx: &mut Context, command: &PipelineCommand) -> Result<()> {
    let repo = ctx.repo().await?;
    let pipelines = ctx.client.pipelines(&repo);

    match command {
        PipelineCommand::List { limit } => {
            let list = pipelines.list(&ctx.cancel, Some(*limit)).await?;
            ctx.emit(&list, |list| {
                print_list(list);
                Ok(())
            })
        }
        PipelineCommand::View { id, web } => {
            let pipeline = match id {
                Some(id) => pipelines.get(&ctx.cancel, *id).await?,
                None => latest(&pipelines, &ctx.cancel).await?,
            };
            if *web {
                let suffix = format!("/cicd/pipeline/{}", pipeline.local_id);
                return open_or_print(&ctx.web_url(&repo, &suffix), false);
            }
            let jobs = pipelines.jobs(&ctx.cancel, pipeline.local_id).await?;
            if ctx.format.is_machine() {
                return output::print_data(
                    ctx.format,
                    &serde_json::json!({"pipeline": pipeline, "jobs": jobs}),
                );
            }
            let mut stdout = std::io::stdout();
            watch::render(&mut stdout, &pipeline, &jobs)?;
            Ok(())
        }
        PipelineCommand::Jobs { id } => {
            let jobs = pipelines.jobs(&ctx.cancel, *id).await?;
            ctx.emit(&jobs, |jobs| {
                print_jobs(jobs);
                Ok(())
            })
        }
        PipelineCommand::Watch {
            id,
            interval,
            exit_status,
        } => {
            let options = WatchOptions::new(*interval, *exit_status)?;
            let local_id = match id {
                Some(id) => *id,
                None => latest(&pipelines, &ctx.cancel).await?.local_id,
            };
            let tty = Term::stdout().is_term();
            let mut stdout = std::io::stdout();
            watch::watch_pipeline(&pipelines, local_id, &options, &ctx.cancel, &mut stdout, tty).await?;
            Ok(())
        }
        PipelineCommand::Cancel { id } => {
            pipelines.cancel(&ctx.cancel, *id).await?;
            output::success(format!("Canceled pipeline #{id}"));
            Ok(())
        }
        PipelineCommand::Restart { id } => {
            pipelines.restart(&ctx.cancel, *id).await?;
            output::success(format!("Restarted pipeline #{id}"));
            Ok(())
        }
    }
}

async fn latest(pipelines: &Pipelines<'_>, cancel: &CancellationToken) -> Result<Pipeline> {
    match pipelines.latest(cancel).await? {
        Some(pipeline) => Ok(pipeline),
        None => bail!("No pipelines in this project yet"),
    }
}

fn print_list(list: &[Pipeline]) {
    if list.is_empty() {
        println!("{}", dim("No pipelines"));
        return;
    }
    let mut table = create_table(&["ID", "STATUS", "REF", "COMMIT", "DURATION", "CREATED"]);
    for p in list {
        table.add_row(vec![
            Cell::new(format!("#{}", p.local_id)),
            state_cell(&run_status_label(&p.status)),
            Cell::new(&p.git_ref),
            Cell::new(p.short_commit()),
            duration_cell(p.duration_secs()),
            Cell::new(p.created_at.short()),
        ]);
    }
    println!("{table}");
}

fn print_jobs(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("{}", dim("No jobs"));
        return;
    }
    let mut table = create_table(&["ID", "NAME", "STAGE", "STATUS", "DURATION"]);
    for job in jobs {
        table.add_row(vec![
            Cell::new(job.local_id),
            Cell::new(&job.name),
            Cell::new(&job.stage),
            state_cell(&run_status_label(&job.status)),
            duration_cell(job.duration_secs()),
        ]);
    }
    println!("{table}");
}
