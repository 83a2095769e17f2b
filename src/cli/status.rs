use anyhow::Result;
use log::debug;
use serde::Serialize;

use super::Context;
use crate::forge::services::{MergeRequestFilter, Pipeline, User};
use crate::gitremote;
use crate::output::{bold, cyan, dim, run_status_label, state, status_icon};

#[derive(Serialize)]
struct StatusReport {
    host: String,
    user: Option<User>,
    repo: Option<String>,
    branch: Option<String>,
    open_merge_requests: Option<usize>,
    latest_pipeline: Option<Pipeline>,
}

pub async fn run(ctx: &mut Context) -> Result<()> {
    let user = if ctx.client.has_token() {
        Some(ctx.client.users().me(&ctx.cancel).await?)
    } else {
        None
    };

    let repo = ctx.repo().await.ok();
    let branch = gitremote::current_branch().await.ok();

    let (open_merge_requests, latest_pipeline) = match &repo {
        Some(repo) => {
            let mrs = ctx
                .client
                .merge_requests(repo)
                .list(&ctx.cancel, MergeRequestFilter::Open, Some(100))
                .await;
            let pipeline = ctx.client.pipelines(repo).latest(&ctx.cancel).await;
            if let Err(err) = &mrs {
                debug!("Could not list merge requests: {err}");
            }
            (
                mrs.ok().map(|m| m.len()),
                pipeline.ok().flatten(),
            )
        }
        None => (None, None),
    };

    let report = StatusReport {
        host: ctx.host.clone(),
        user,
        repo: repo.map(|r| r.to_string()),
        branch,
        open_merge_requests,
        latest_pipeline,
    };

    ctx.emit(&report, |report| {
        print_report(report);
        Ok(())
    })
}

fn print_report(report: &StatusReport) {
    let user = match &report.user {
        Some(user) => bold(&user.username).to_string(),
        None => dim("not logged in").to_string(),
    };
    println!("{:<14} {}", "Host", report.host);
    println!("{:<14} {}", "User", user);
    println!(
        "{:<14} {}",
        "Repository",
        report.repo.as_deref().map(|r| cyan(r).to_string()).unwrap_or_else(|| dim("-").to_string())
    );
    println!("{:<14} {}", "Branch", report.branch.as_deref().unwrap_or("-"));
    if let Some(count) = report.open_merge_requests {
        println!("{:<14} {count} open", "Merge requests");
    }
    match &report.latest_pipeline {
        Some(p) => println!(
            "{:<14} {} #{} {} {}",
            "Pipeline",
            status_icon(&p.status),
            p.local_id,
            state(&run_status_label(&p.status)),
            dim(format!("{} @ {}", p.git_ref, p.short_commit()))
        ),
        None if report.repo.is_some() => println!("{:<14} {}", "Pipeline", dim("none")),
        None => {}
    }
}
