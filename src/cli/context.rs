use anyhow::{bail, Context as _, Result};
use console::Term;
use log::debug;
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use super::GlobalArgs;
use crate::auth::{self, Token};
use crate::config::{self, Config};
use crate::forge::{Client, RepoRef};
use crate::gitremote;
use crate::output::{self, OutputFormat};

const DEFAULT_REMOTE: &str = "origin";

/// Everything a command needs: the client, the cancellation token and the
/// resolved host, repository and output settings.
pub struct Context {
    pub client: Client,
    pub cancel: CancellationToken,
    pub format: OutputFormat,
    pub host: String,
    config: Config,
    config_path: PathBuf,
    env_token: Option<String>,
    repo_flag: Option<String>,
}

impl Context {
    pub fn new(global: &GlobalArgs, cancel: CancellationToken) -> Result<Self> {
        let config_path = match &global.config {
            Some(path) => path.clone(),
            None => config::default_path()?,
        };
        let config = Config::load(Some(config_path.as_path()))?;
        let host = config.resolve_host(global.host.as_deref());
        let token = config.token_for(&host, global.token.as_deref());
        debug!("Using host {host} (token {})", if token.is_some() { "present" } else { "absent" });

        let client = Client::from_host(&host, token)?;

        Ok(Self {
            client,
            cancel,
            format: global.format,
            host,
            config,
            config_path,
            env_token: global.token.clone().filter(|t| !t.trim().is_empty()),
            repo_flag: global.repo.clone(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path)
    }

    pub fn token_from_env(&self) -> bool {
        self.env_token.is_some()
    }

    /// Repository from `--repo`, else from the origin remote.
    pub async fn repo(&self) -> Result<RepoRef> {
        if let Some(flag) = &self.repo_flag {
            return Ok(flag.parse()?);
        }
        let remote = gitremote::detect_remote(DEFAULT_REMOTE)
            .await
            .context("Could not determine the repository; pass --repo OWNER/PROJECT")?;
        if remote.host != self.host {
            debug!("Remote host {} differs from configured host {}", remote.host, self.host);
        }
        Ok(remote.repo)
    }

    /// Web page of `repo`, optionally with a resource suffix such as `/issue/3`.
    pub fn web_url(&self, repo: &RepoRef, suffix: &str) -> String {
        let host = self.host.strip_prefix("api.").unwrap_or(&self.host);
        format!("https://{host}/project/{}/{}{suffix}", repo.owner, repo.project)
    }

    /// Prints `value` as JSON/YAML, or runs `table` for the human format.
    pub fn emit<T, F>(&self, value: &T, table: F) -> Result<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T) -> Result<()>,
    {
        if self.format.is_machine() {
            output::print_data(self.format, value)
        } else {
            table(value)
        }
    }

    /// Asks for a new token, checks it and stores it for the current host.
    pub async fn reauthenticate(&mut self) -> Result<()> {
        let token = auth::prompt_token(&self.host)?;
        self.login_with(token).await?;
        if self.token_from_env() {
            output::warning("GF_TOKEN is set and will override the stored token next time.");
        }
        Ok(())
    }

    /// Verifies `token` against the server, then saves it and starts using it.
    pub async fn login_with(&mut self, token: Token) -> Result<String> {
        self.client.set_token(Some(token.clone()));
        let user = self
            .client
            .users()
            .me(&self.cancel)
            .await
            .context("Token verification failed")?;

        let host = self.host.clone();
        self.config.login(&host, &token, Some(user.username.clone()));
        self.save_config()?;
        Ok(user.username)
    }

    pub fn require_token(&self) -> Result<()> {
        if !self.client.has_token() {
            bail!("Not logged in to {}. Run `gf auth login` or set GF_TOKEN.", self.host);
        }
        Ok(())
    }
}

/// Yes/no prompt on the terminal; `false` when there is no terminal.
pub fn confirm(question: &str) -> Result<bool> {
    let term = Term::stderr();
    if !term.is_term() {
        return Ok(false);
    }
    term.write_str(&format!("{question} [y/N] "))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Aborts destructive commands unless `--yes` was given or the user agrees.
pub fn ensure_confirmed(yes: bool, question: &str) -> Result<()> {
    if yes || confirm(question)? {
        return Ok(());
    }
    bail!("Aborted (pass --yes to skip confirmation)")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(dir: &std::path::Path, host: Option<&str>, repo: Option<&str>) -> GlobalArgs {
        GlobalArgs {
            repo: repo.map(str::to_string),
            format: OutputFormat::Table,
            host: host.map(str::to_string),
            token: None,
            config: Some(dir.join("config.json")),
        }
    }

    #[test]
    fn defaults_to_cloud_host_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(&global(dir.path(), None, None), CancellationToken::new()).unwrap();
        assert_eq!(ctx.host, "gitflic.ru");
        assert_eq!(ctx.client.base_url(), "https://api.gitflic.ru");
        assert!(ctx.require_token().is_err());
    }

    #[test]
    fn stored_token_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.login("git.example.com", &Token::from("stored"), None);
        config.save(&dir.path().join("config.json")).unwrap();

        let ctx = Context::new(&global(dir.path(), None, None), CancellationToken::new()).unwrap();
        assert_eq!(ctx.host, "git.example.com");
        assert_eq!(ctx.client.base_url(), "https://git.example.com/rest-api");
        assert!(ctx.client.has_token());
        assert!(!ctx.token_from_env());
    }

    #[tokio::test]
    async fn repo_flag_and_web_urls() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(
            &global(dir.path(), Some("git.example.com"), Some("acme/app.git")),
            CancellationToken::new(),
        )
        .unwrap();

        let repo = ctx.repo().await.unwrap();
        assert_eq!(repo.to_string(), "acme/app");
        assert_eq!(
            ctx.web_url(&repo, "/issue/3"),
            "https://git.example.com/project/acme/app/issue/3"
        );
    }

    #[test]
    fn yes_flag_skips_confirmation() {
        assert!(ensure_confirmed(true, "Delete?").is_ok());
    }
}
