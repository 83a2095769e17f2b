use anyhow::Result;
use clap::Subcommand;
use comfy_table::Cell;

use super::context::ensure_confirmed;
use super::Context;
use crate::forge::services::{EventSet, NewWebhook, Webhook, WebhookPatch};
use crate::output::{self, bold, create_table, dim};

#[derive(Subcommand, Debug)]
pub enum WebhookCommand {
    /// List webhooks
    #[command(alias = "ls")]
    List,
    /// Show one webhook
    View { id: String },
    /// Add a webhook
    Create {
        /// Payload URL
        url: String,

        /// Event groups, comma separated (push, tag, branch, merge-request, discussion,
        /// issue, pipeline, release, collaborator, project)
        #[arg(short, long, value_delimiter = ',', required = true)]
        events: Vec<String>,

        /// Shared secret sent with each delivery
        #[arg(short, long)]
        secret: Option<String>,
    },
    /// Change a webhook's URL, secret or events
    Edit {
        id: String,

        #[arg(short, long)]
        url: Option<String>,

        #[arg(short, long, value_delimiter = ',')]
        events: Option<Vec<String>>,

        #[arg(short, long)]
        secret: Option<String>,
    },
    /// Remove a webhook
    Delete {
        id: String,

        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn run(ctx: &mut Context, command: &WebhookCommand) -> Result<()> {
    let repo = ctx.repo().await?;
    let hooks = ctx.client.webhooks(&repo);

    match command {
        WebhookCommand::List => {
            let list = hooks.list(&ctx.cancel).await?;
            ctx.emit(&list, |list| {
                print_list(list);
                Ok(())
            })
        }
        WebhookCommand::View { id } => {
            let hook = hooks.get(&ctx.cancel, id).await?;
            ctx.emit(&hook, |hook| {
                println!("{} {}", bold(&hook.url), dim(&hook.id));
                println!("Events: {}", hook.events.groups().join(", "));
                println!("Secret: {}", if hook.secret.is_some() { "set" } else { "none" });
                Ok(())
            })
        }
        WebhookCommand::Create { url, events, secret } => {
            let new = NewWebhook {
                url: url.clone(),
                secret: secret.clone(),
                events: EventSet::from_groups(events.as_slice())?,
            };
            let hook = hooks.create(&ctx.cancel, &new).await?;
            output::success(format!("Created webhook {}", hook.id));
            Ok(())
        }
        WebhookCommand::Edit { id, url, events, secret } => {
            let patch = WebhookPatch {
                url: url.clone(),
                secret: secret.clone(),
                events: events.as_deref().map(EventSet::from_groups).transpose()?,
            };
            hooks.update(&ctx.cancel, id, &patch).await?;
            output::success(format!("Updated webhook {id}"));
            Ok(())
        }
        WebhookCommand::Delete { id, yes } => {
            ensure_confirmed(*yes, &format!("Delete webhook {id} in {repo}?"))?;
            hooks.delete(&ctx.cancel, id).await?;
            output::success(format!("Deleted webhook {id}"));
            Ok(())
        }
    }
}

fn print_list(list: &[Webhook]) {
    if list.is_empty() {
        println!("{}", dim("No webhooks"));
        return;
    }
    let mut table = create_table(&["ID", "URL", "EVENTS"]);
    for hook in list {
        table.add_row(vec![
            Cell::new(&hook.id),
            Cell::new(&hook.url),
            Cell::new(hook.events.groups().join(", ")),
        ]);
    }
    println!("{table}");
}
