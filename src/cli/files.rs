use anyhow::{Context as _, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::Context;
use crate::forge::client::safe_file_name;
use crate::forge::services::TreeEntry;
use crate::forge::{Download, RepoRef};
use crate::output::{self, create_table, dim, transfer_bar};

#[derive(Subcommand, Debug)]
pub enum FileCommand {
    /// List a directory of the repository
    #[command(alias = "ls")]
    List {
        /// Directory inside the repository
        #[arg(default_value = "")]
        dir: String,

        /// Branch, tag or commit (defaults to the project's default branch)
        #[arg(short = 'r', long = "ref")]
        git_ref: Option<String>,
    },
    /// Download a single file
    Download {
        /// Path inside the repository
        file: String,

        #[arg(short = 'r', long = "ref")]
        git_ref: Option<String>,

        /// Where to save it (defaults to the file's name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run(ctx: &mut Context, command: &FileCommand) -> Result<()> {
    let repo = ctx.repo().await?;

    match command {
        FileCommand::List { dir, git_ref } => {
            let commit = resolve_ref(ctx, &repo, git_ref.as_deref()).await?;
            let entries = ctx.client.files(&repo).list(&ctx.cancel, &commit, dir).await?;
            ctx.emit(&entries, |entries| {
                print_entries(entries);
                Ok(())
            })
        }
        FileCommand::Download { file, git_ref, output: dest } => {
            let commit = resolve_ref(ctx, &repo, git_ref.as_deref()).await?;
            let download = ctx.client.files(&repo).download(&ctx.cancel, &commit, file).await?;
            let dest = match dest {
                Some(path) => path.clone(),
                None => {
                    let name = download
                        .file_name
                        .as_deref()
                        .and_then(safe_file_name)
                        .or_else(|| safe_file_name(file))
                        .with_context(|| format!("Cannot derive a file name from {file:?}; pass --output"))?;
                    PathBuf::from(name)
                }
            };
            let written = save_download(&ctx.cancel, download, &dest).await?;
            output::success(format!("Saved {} ({written} bytes)", dest.display()));
            Ok(())
        }
    }
}

async fn resolve_ref(ctx: &Context, repo: &RepoRef, git_ref: Option<&str>) -> Result<String> {
    if let Some(git_ref) = git_ref {
        return Ok(git_ref.to_string());
    }
    let project = ctx.client.projects().get(&ctx.cancel, repo).await?;
    Ok(project.default_branch.unwrap_or_else(|| "master".to_string()))
}

/// Streams `download` into `dest` with a progress bar. A partial file is removed on failure.
pub(super) async fn save_download(cancel: &CancellationToken, download: Download, dest: &Path) -> Result<u64> {
    let bar = transfer_bar(download.content_length(), dest.display().to_string());
    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let result = download.write_to(cancel, &mut file, |n| bar.set_position(n)).await;
    match result {
        Ok(written) => {
            bar.finish_and_clear();
            file.shutdown().await?;
            Ok(written)
        }
        Err(err) => {
            bar.abandon();
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            Err(err.into())
        }
    }
}

fn print_entries(entries: &[TreeEntry]) {
    if entries.is_empty() {
        println!("{}", dim("Empty directory"));
        return;
    }
    let mut table = create_table(&["NAME", "TYPE", "SIZE"]);
    for entry in entries {
        let name = if entry.is_dir() {
            Cell::new(format!("{}/", entry.name)).fg(Color::Cyan)
        } else {
            Cell::new(&entry.name)
        };
        let size = entry.size.filter(|_| !entry.is_dir()).map(|s| s.to_string()).unwrap_or_default();
        table.add_row(vec![name, Cell::new(entry.kind.to_lowercase()), Cell::new(size)]);
    }
    println!("{table}");
}
