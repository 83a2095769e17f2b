//! Repository detection from the local git checkout.

use anyhow::{bail, Context, Result};
use log::debug;
use tokio::process::Command;
use url::Url;

use crate::forge::RepoRef;

const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

/// Checks a branch, tag or remote name before it is handed to `git`.
pub fn validate_ref_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("name must not be empty".into());
    }
    if name.starts_with('-') {
        return Err(format!("{name:?} must not start with '-'"));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(format!("{name:?} must not contain whitespace or control characters"));
    }
    if name.contains("..") {
        return Err(format!("{name:?} must not contain '..'"));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(format!("{name:?} must not contain {c:?}"));
    }
    Ok(())
}

/// Repository a git remote points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub host: String,
    pub repo: RepoRef,
}

/// Parses SSH (`git@host:o/p.git`, `ssh://git@host/o/p.git`) and HTTPS remote URLs.
pub fn parse_remote_url(raw: &str) -> Option<Remote> {
    let raw = raw.trim();

    let (host, path) = if raw.contains("://") {
        let url = Url::parse(raw).ok()?;
        (url.host_str()?.to_string(), url.path().to_string())
    } else {
        // scp-like syntax: [user@]host:path
        let (user_host, path) = raw.split_once(':')?;
        let host = user_host.rsplit('@').next()?;
        (host.to_string(), path.to_string())
    };

    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let segments = match segments.as_slice() {
        ["project", rest @ ..] if rest.len() == 2 => rest,
        other => other,
    };
    let &[owner, project] = segments else {
        return None;
    };

    let project = project.strip_suffix(".git").unwrap_or(project);
    if host.is_empty() || owner.is_empty() || project.is_empty() {
        return None;
    }
    Some(Remote {
        host: web_host(&host).to_string(),
        repo: RepoRef::new(owner, project),
    })
}

/// Maps git transport hosts onto the host name used in the config.
fn web_host(host: &str) -> &str {
    host.strip_prefix("api.")
        .or_else(|| host.strip_prefix("git."))
        .filter(|h| h.contains(crate::forge::CLOUD_HOST))
        .unwrap_or(host)
}

async fn git(args: &[&str]) -> Result<String> {
    debug!("git {}", args.join(" "));
    let output = Command::new("git")
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .context("Failed to run git")?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Repository behind the named remote of the current checkout.
pub async fn detect_remote(remote: &str) -> Result<Remote> {
    validate_ref_name(remote).map_err(|e| anyhow::anyhow!("invalid remote name: {e}"))?;
    let url = git(&["remote", "get-url", "--", remote]).await?;
    parse_remote_url(&url).with_context(|| format!("Remote {remote} ({url}) is not a GitFlic repository"))
}

pub async fn current_branch() -> Result<String> {
    let branch = git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
    if branch == "HEAD" {
        bail!("Not on a branch (detached HEAD)");
    }
    Ok(branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ssh_and_https_remotes() {
        let expected = Remote {
            host: "gitflic.ru".into(),
            repo: RepoRef::new("acme", "widgets"),
        };
        for url in [
            "git@gitflic.ru:acme/widgets.git",
            "ssh://git@gitflic.ru/acme/widgets.git",
            "ssh://git@gitflic.ru:2222/acme/widgets",
            "https://gitflic.ru/project/acme/widgets.git",
            "https://user@gitflic.ru/acme/widgets",
        ] {
            assert_eq!(parse_remote_url(url), Some(expected.clone()), "{url}");
        }
    }

    #[test]
    fn keeps_self_hosted_host() {
        let remote = parse_remote_url("https://git.example.com/team/app.git").unwrap();
        assert_eq!(remote.host, "git.example.com");
        assert_eq!(remote.repo.to_string(), "team/app");
    }

    #[test]
    fn rejects_non_repository_urls() {
        assert!(parse_remote_url("https://gitflic.ru/").is_none());
        assert!(parse_remote_url("https://gitflic.ru/a/b/c").is_none());
        assert!(parse_remote_url("not a url").is_none());
    }

    #[tokio::test]
    async fn git_failures_are_errors() {
        let err = git(&["no-such-subcommand-for-gf"]).await.unwrap_err();
        assert!(err.to_string().contains("git"), "{err:#}");
    }

    #[tokio::test]
    async fn invalid_remote_name_is_rejected_before_running_git() {
        let err = detect_remote("-upload-pack=evil").await.unwrap_err();
        assert!(err.to_string().contains("invalid remote name"), "{err:#}");
    }

    #[test]
    fn ref_name_validation() {
        for ok in ["main", "feature/login", "v1.0.0", "release-2024"] {
            assert!(validate_ref_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", "-rf", "a b", "a..b", "a~1", "x^", "a:b", "wh?", "st*r", "[x", "a\\b", "tab\there"] {
            assert!(validate_ref_name(bad).is_err(), "{bad:?}");
        }
    }
}
