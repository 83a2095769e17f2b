//! Live pipeline view.
//!
//! A single loop polls the pipeline and its jobs on a fixed interval and
//! redraws them until the pipeline finishes or the cancellation token fires.

use std::io::Write;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{ExitError, GfError, Result};
use crate::forge::services::{Job, Pipeline, Pipelines};
use crate::output::{bold, cyan, dim, format_duration, run_status_label, state, status_icon};

pub const MIN_INTERVAL_SECS: i64 = 1;
pub const MAX_INTERVAL_SECS: i64 = 300;

const DEFAULT_TICK_DEADLINE: Duration = Duration::from_secs(30);

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const SEPARATOR: &str = "────────────────────────────────────────";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    pub interval: Duration,
    /// Budget for fetching one pipeline snapshot and its jobs.
    pub tick_deadline: Duration,
    /// Turn the final pipeline status into the process exit code.
    pub exit_status: bool,
}

impl WatchOptions {
    /// Intervals below one second are raised to one; above five minutes is an error.
    pub fn new(interval_secs: i64, exit_status: bool) -> Result<Self> {
        if interval_secs > MAX_INTERVAL_SECS {
            return Err(GfError::InvalidInput(format!(
                "interval must be at most {MAX_INTERVAL_SECS} seconds, got {interval_secs}"
            )));
        }
        let secs = interval_secs.max(MIN_INTERVAL_SECS) as u64;
        Ok(Self {
            interval: Duration::from_secs(secs),
            tick_deadline: DEFAULT_TICK_DEADLINE,
            exit_status,
        })
    }
}

/// Watches pipeline `local_id` until it reaches a terminal status.
///
/// Cancellation prints a note and returns `Ok(())`. When `exit_status` is set
/// a finished pipeline yields [`GfError::Exit`] carrying 0 or 1.
pub async fn watch_pipeline<W: Write>(
    pipelines: &Pipelines<'_>,
    local_id: u64,
    options: &WatchOptions,
    cancel: &CancellationToken,
    out: &mut W,
    tty: bool,
) -> Result<()> {
    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut renders = 0usize;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return stopped(out),
            _ = ticker.tick() => {}
        }

        let deadline = options.tick_deadline;
        let snapshot = match tokio::time::timeout(deadline, fetch(pipelines, cancel, local_id)).await {
            Ok(result) => result,
            Err(_) => Err(GfError::DeadlineExceeded),
        };
        let (pipeline, jobs) = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_deadline_exceeded() => {
                warn!(
                    "Pipeline #{local_id} did not respond within {}ms, retrying next tick",
                    deadline.as_millis()
                );
                continue;
            }
            Err(e) if e.is_cancelled() => return stopped(out),
            Err(e) => return Err(e),
        };

        if renders > 0 {
            if tty {
                write!(out, "{CLEAR_SCREEN}")?;
            } else {
                writeln!(out, "{}", dim(SEPARATOR))?;
            }
        }
        render(out, &pipeline, &jobs)?;
        out.flush()?;
        renders += 1;
        debug!("Rendered pipeline #{local_id} ({} jobs), status {}", jobs.len(), pipeline.status);

        if pipeline.status.is_terminal() {
            if options.exit_status {
                return Err(ExitError::new(pipeline.status.exit_code()).into());
            }
            return Ok(());
        }
    }
}

async fn fetch(
    pipelines: &Pipelines<'_>,
    cancel: &CancellationToken,
    local_id: u64,
) -> Result<(Pipeline, Vec<Job>)> {
    let pipeline = pipelines.get(cancel, local_id).await?;
    let jobs = pipelines.jobs(cancel, local_id).await?;
    Ok((pipeline, jobs))
}

fn stopped<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "\n{}", dim("Stopped watching."))?;
    Ok(())
}

/// Header, one line per job, then the overall status.
pub fn render<W: Write>(out: &mut W, pipeline: &Pipeline, jobs: &[Job]) -> std::io::Result<()> {
    writeln!(
        out,
        "{} {} {} {}",
        bold(format!("Pipeline #{}", pipeline.local_id)),
        cyan(&pipeline.git_ref),
        dim("@"),
        dim(pipeline.short_commit())
    )?;
    writeln!(out)?;

    let name_width = jobs.iter().map(|j| j.name.chars().count()).max().unwrap_or(0);
    let stage_width = jobs.iter().map(|j| j.stage.chars().count()).max().unwrap_or(0);
    for job in jobs {
        let label = run_status_label(&job.status);
        writeln!(
            out,
            "  {} {:name_width$}  {}  {:<12} {}",
            status_icon(&job.status),
            job.name,
            dim(format!("{:stage_width$}", job.stage)),
            state(&label),
            dim(format_duration(job.duration_secs())),
        )?;
    }
    if jobs.is_empty() {
        writeln!(out, "  {}", dim("No jobs yet"))?;
    }

    let finished = jobs.iter().filter(|j| j.status.is_terminal()).count();
    writeln!(out)?;
    writeln!(
        out,
        "{} {} {}",
        status_icon(&pipeline.status),
        state(&run_status_label(&pipeline.status)),
        dim(format!(
            "({finished}/{} jobs finished, {})",
            jobs.len(),
            format_duration(pipeline.duration_secs())
        ))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::services::test_support::{client_for, repo};
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    fn pipeline_page(status: &str) -> String {
        json!({"_embedded": {"restPipelineModelList": [
            {"localId": 7, "status": status, "commitId": "1234567890abcdef", "ref": "master",
             "createdAt": "2024-05-01T12:00:00Z"}
        ]}})
        .to_string()
    }

    async fn mock_jobs(server: &mut ServerGuard, status: &str) {
        server
            .mock("GET", "/project/o/r/cicd/pipeline/7/jobs")
            .with_status(200)
            .with_body(
                json!({"_embedded": {"restPipelineJobModelList": [
                    {"localId": 1, "name": "build", "stageName": "build", "status": "SUCCESS", "duration": 12},
                    {"localId": 2, "name": "test", "stageName": "test", "status": status}
                ]}})
                .to_string(),
            )
            .create_async()
            .await;
    }

    async fn mock_statuses(server: &mut ServerGuard, statuses: &[&str]) {
        for status in statuses {
            server
                .mock("GET", "/project/o/r/cicd/pipeline")
                .match_query(Matcher::Any)
                .with_status(200)
                .with_body(pipeline_page(status))
                .expect(1)
                .create_async()
                .await;
        }
    }

    async fn run_watch(final_status: &str) -> (Result<()>, String) {
        let mut server = Server::new_async().await;
        mock_statuses(&mut server, &["RUNNING", "RUNNING", final_status]).await;
        mock_jobs(&mut server, "RUNNING").await;

        let client = client_for(&server);
        let repo = repo();
        let options = WatchOptions::new(1, true).unwrap();
        let mut out = Vec::new();
        let result = watch_pipeline(
            &client.pipelines(&repo),
            7,
            &options,
            &CancellationToken::new(),
            &mut out,
            false,
        )
        .await;
        (result, String::from_utf8(out).unwrap())
    }

    fn exit_code(result: Result<()>) -> Option<i32> {
        match result {
            Err(GfError::Exit(e)) => Some(e.code),
            _ => None,
        }
    }

    #[tokio::test]
    async fn success_exits_zero_after_three_renders() {
        let (result, output) = run_watch("SUCCESS").await;
        assert_eq!(exit_code(result), Some(0));
        assert_eq!(output.matches("Pipeline #7").count(), 3);
        assert_eq!(output.matches(SEPARATOR).count(), 2);
        assert!(output.contains("running..."));
    }

    #[tokio::test]
    async fn failure_exits_one() {
        let (result, output) = run_watch("FAILED").await;
        assert_eq!(exit_code(result), Some(1));
        assert_eq!(output.matches("Pipeline #7").count(), 3);
    }

    #[tokio::test]
    async fn without_exit_status_finishes_ok() {
        let mut server = Server::new_async().await;
        mock_statuses(&mut server, &["CANCELED"]).await;
        mock_jobs(&mut server, "CANCELED").await;

        let client = client_for(&server);
        let repo = repo();
        let mut out = Vec::new();
        watch_pipeline(
            &client.pipelines(&repo),
            7,
            &WatchOptions::new(1, false).unwrap(),
            &CancellationToken::new(),
            &mut out,
            true,
        )
        .await
        .unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(!output.contains(CLEAR_SCREEN));
        assert!(output.contains("canceled"));
    }

    #[tokio::test]
    async fn cancellation_returns_ok_even_with_exit_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/cicd/pipeline")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(pipeline_page("RUNNING"))
            .create_async()
            .await;
        mock_jobs(&mut server, "RUNNING").await;

        let client = client_for(&server);
        let repo = repo();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let mut out = Vec::new();
        watch_pipeline(
            &client.pipelines(&repo),
            7,
            &WatchOptions::new(1, true).unwrap(),
            &cancel,
            &mut out,
            true,
        )
        .await
        .unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Stopped watching."));
        assert!(output.contains(CLEAR_SCREEN));
    }

    #[tokio::test]
    async fn slow_tick_is_skipped_and_polling_continues() {
        let mut server = Server::new_async().await;
        let slow = server
            .mock("GET", "/project/o/r/cicd/pipeline")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(600));
                w.write_all(pipeline_page("RUNNING").as_bytes())
            })
            .expect(1)
            .create_async()
            .await;
        mock_statuses(&mut server, &["SUCCESS"]).await;
        mock_jobs(&mut server, "SUCCESS").await;

        let client = client_for(&server);
        let repo = repo();
        let options = WatchOptions {
            tick_deadline: Duration::from_millis(200),
            ..WatchOptions::new(1, true).unwrap()
        };
        let mut out = Vec::new();
        let result = watch_pipeline(
            &client.pipelines(&repo),
            7,
            &options,
            &CancellationToken::new(),
            &mut out,
            false,
        )
        .await;

        assert_eq!(exit_code(result), Some(0));
        let output = String::from_utf8(out).unwrap();
        assert_eq!(output.matches("Pipeline #7").count(), 1);
        assert!(!output.contains(SEPARATOR));
        slow.assert_async().await;
    }

    #[tokio::test]
    async fn api_errors_abort_the_watch() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/cicd/pipeline")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let err = watch_pipeline(
            &client.pipelines(&repo),
            7,
            &WatchOptions::new(1, true).unwrap(),
            &CancellationToken::new(),
            &mut Vec::new(),
            false,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn interval_bounds() {
        assert_eq!(WatchOptions::new(0, false).unwrap().interval, Duration::from_secs(1));
        assert_eq!(WatchOptions::new(5, false).unwrap().tick_deadline, Duration::from_secs(30));
        assert_eq!(WatchOptions::new(-5, false).unwrap().interval, Duration::from_secs(1));
        assert_eq!(WatchOptions::new(300, false).unwrap().interval, Duration::from_secs(300));
        assert!(WatchOptions::new(301, false).is_err());
    }
}
