use anyhow::{Context as _, Result};
use clap::Subcommand;
use comfy_table::Cell;
use std::path::PathBuf;

use super::context::ensure_confirmed;
use super::files::save_download;
use super::Context;
use crate::forge::client::safe_file_name;
use crate::forge::services::{NewRelease, Release, ReleasePatch};
use crate::output::{self, bold, create_table, dim, Spinner};

#[derive(Subcommand, Debug)]
pub enum ReleaseCommand {
    /// List releases
    #[command(alias = "ls")]
    List {
        #[arg(short = 'L', long, default_value_t = 30)]
        limit: usize,
    },
    /// Show a release and its assets
    View { tag: String },
    /// Publish a release for a tag
    Create {
        tag: String,

        /// Title (defaults to the tag)
        #[arg(short, long, default_value = "")]
        title: String,

        #[arg(short, long, default_value = "")]
        notes: String,

        #[arg(long)]
        prerelease: bool,

        #[arg(long)]
        draft: bool,
    },
    /// Change the title, notes or prerelease flag
    Edit {
        tag: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,

        #[arg(long)]
        prerelease: Option<bool>,
    },
    /// Delete a release (the tag is kept)
    Delete {
        tag: String,

        #[arg(short, long)]
        yes: bool,
    },
    /// Attach files to a release
    Upload {
        tag: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Download a release asset
    Download {
        tag: String,

        /// Asset name
        asset: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run(ctx: &mut Context, command: &ReleaseCommand) -> Result<()> {
    let repo = ctx.repo().await?;
    let releases = ctx.client.releases(&repo);

    match command {
        ReleaseCommand::List { limit } => {
            let (list, total) = releases.list_with_total(&ctx.cancel, Some(*limit)).await?;
            ctx.emit(&list, |list| {
                print_list(list, total);
                Ok(())
            })
        }
        ReleaseCommand::View { tag } => {
            let release = releases.get(&ctx.cancel, tag).await?;
            ctx.emit(&release, |release| {
                print_detail(release);
                Ok(())
            })
        }
        ReleaseCommand::Create {
            tag,
            title,
            notes,
            prerelease,
            draft,
        } => {
            let new = NewRelease {
                tag_name: tag.clone(),
                title: title.clone(),
                description: notes.clone(),
                pre_release: *prerelease,
                is_draft: *draft,
            };
            let release = releases.create(&ctx.cancel, &new).await?;
            output::success(format!("Created release {}", bold(&release.tag_name)));
            Ok(())
        }
        ReleaseCommand::Edit {
            tag,
            title,
            notes,
            prerelease,
        } => {
            let patch = ReleasePatch {
                title: title.clone(),
                description: notes.clone(),
                pre_release: *prerelease,
            };
            releases.update(&ctx.cancel, tag, &patch).await?;
            output::success(format!("Updated release {tag}"));
            Ok(())
        }
        ReleaseCommand::Delete { tag, yes } => {
            ensure_confirmed(*yes, &format!("Delete release {tag} in {repo}?"))?;
            releases.delete(&ctx.cancel, tag).await?;
            output::success(format!("Deleted release {tag}"));
            Ok(())
        }
        ReleaseCommand::Upload { tag, files } => {
            for file in files {
                let spinner = Spinner::start(format!("Uploading {}", file.display()));
                match releases.upload(&ctx.cancel, tag, file).await {
                    Ok(name) => spinner.finish(format!("Uploaded {name}")),
                    Err(err) => {
                        spinner.fail(format!("Upload of {} failed", file.display()));
                        return Err(err.into());
                    }
                }
            }
            Ok(())
        }
        ReleaseCommand::Download { tag, asset, output: dest } => {
            let (found, download) = releases.download_asset(&ctx.cancel, tag, asset).await?;
            let dest = match dest {
                Some(path) => path.clone(),
                None => safe_file_name(&found.name)
                    .map(PathBuf::from)
                    .with_context(|| format!("Asset name {:?} is not a usable file name; pass --output", found.name))?,
            };
            let written = save_download(&ctx.cancel, download, &dest).await?;
            output::success(format!("Saved {} ({written} bytes)", dest.display()));
            Ok(())
        }
    }
}

fn print_list(list: &[Release], total: u64) {
    if list.is_empty() {
        println!("{}", dim("No releases"));
        return;
    }
    let mut table = create_table(&["TAG", "TITLE", "TYPE", "ASSETS", "CREATED"]);
    for release in list {
        table.add_row(vec![
            Cell::new(&release.tag_name),
            Cell::new(&release.title),
            Cell::new(kind(release)),
            Cell::new(release.attachment_files.len()),
            Cell::new(release.created_at.short()),
        ]);
    }
    println!("{table}");
    if total > list.len() as u64 {
        println!("{}", dim(format!("Showing {} of {total} releases", list.len())));
    }
}

fn kind(release: &Release) -> &'static str {
    match (release.is_draft, release.is_prerelease) {
        (true, _) => "draft",
        (false, true) => "prerelease",
        (false, false) => "release",
    }
}

fn print_detail(release: &Release) {
    println!("{} {}", bold(&release.title), dim(&release.tag_name));
    println!("{} {}", kind(release), dim(release.created_at.short()));
    if let Some(description) = release.description.as_deref().filter(|d| !d.trim().is_empty()) {
        println!("\n{description}");
    }
    if !release.attachment_files.is_empty() {
        println!("\n{}", bold("Assets"));
        for asset in &release.attachment_files {
            let size = asset.size.map(|s| format!("{s} bytes")).unwrap_or_default();
            println!("  {}  {}", asset.name, dim(size));
        }
    }
}
