//! Per-resource façades over [`Client`].
//!
//! Services are cheap handles borrowing the client (and, for project-scoped
//! resources, the repository) and are created on demand through the
//! accessor methods below.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::request::segment;
use crate::error::GfError;

pub mod branches;
pub mod commits;
pub mod files;
pub mod issues;
pub mod merge_requests;
pub mod pipelines;
pub mod projects;
pub mod releases;
pub mod tags;
pub mod users;
pub mod webhooks;

pub use branches::{Branch, Branches};
pub use commits::{Commit, Commits};
pub use files::{Files, TreeEntry};
pub use issues::{Issue, IssueFilter, Issues, NewIssue};
pub use merge_requests::{MergeRequest, MergeRequestFilter, MergeRequests, NewMergeRequest};
pub use pipelines::{Job, Pipeline, Pipelines};
pub use projects::{Project, Projects};
pub use releases::{NewRelease, Release, ReleasePatch, Releases};
pub use tags::{Tag, Tags};
pub use users::{User, Users};
pub use webhooks::{EventSet, NewWebhook, Webhook, WebhookPatch, Webhooks};

/// Page size used when a caller does not cap the result.
pub(crate) const DEFAULT_PAGE_SIZE: usize = 30;
/// Largest page the server hands out.
pub(crate) const MAX_PAGE_SIZE: usize = 100;

/// `owner/project` pair addressing a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub project: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            project: project.into(),
        }
    }

    /// API path under this repository, e.g. `/project/o/p/branch`.
    pub fn path(&self, suffix: &str) -> String {
        format!(
            "/project/{}/{}{suffix}",
            segment(&self.owner),
            segment(&self.project)
        )
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.project)
    }
}

impl FromStr for RepoRef {
    type Err = GfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('/');
        match trimmed.split_once('/') {
            Some((owner, project))
                if !owner.is_empty() && !project.is_empty() && !project.contains('/') =>
            {
                Ok(Self::new(owner, project.trim_end_matches(".git")))
            }
            _ => Err(GfError::InvalidInput(format!(
                "expected OWNER/PROJECT, got {s:?}"
            ))),
        }
    }
}

/// `{id, title, color}` object the server uses for statuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Clamps a caller-provided limit to a valid page size.
pub(crate) fn page_size(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

impl Client {
    pub fn users(&self) -> Users<'_> {
        Users::new(self)
    }

    pub fn projects(&self) -> Projects<'_> {
        Projects::new(self)
    }

    pub fn merge_requests<'a>(&'a self, repo: &'a RepoRef) -> MergeRequests<'a> {
        MergeRequests::new(self, repo)
    }

    pub fn pipelines<'a>(&'a self, repo: &'a RepoRef) -> Pipelines<'a> {
        Pipelines::new(self, repo)
    }

    pub fn issues<'a>(&'a self, repo: &'a RepoRef) -> Issues<'a> {
        Issues::new(self, repo)
    }

    pub fn releases<'a>(&'a self, repo: &'a RepoRef) -> Releases<'a> {
        Releases::new(self, repo)
    }

    pub fn branches<'a>(&'a self, repo: &'a RepoRef) -> Branches<'a> {
        Branches::new(self, repo)
    }

    pub fn tags<'a>(&'a self, repo: &'a RepoRef) -> Tags<'a> {
        Tags::new(self, repo)
    }

    pub fn commits<'a>(&'a self, repo: &'a RepoRef) -> Commits<'a> {
        Commits::new(self, repo)
    }

    pub fn files<'a>(&'a self, repo: &'a RepoRef) -> Files<'a> {
        Files::new(self, repo)
    }

    pub fn webhooks<'a>(&'a self, repo: &'a RepoRef) -> Webhooks<'a> {
        Webhooks::new(self, repo)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_paths_escape_segments() {
        let repo = RepoRef::new("my team", "app");
        assert_eq!(repo.path("/branch"), "/project/my%20team/app/branch");
    }

    #[test]
    fn parses_owner_project() {
        let repo: RepoRef = "acme/widgets".parse().unwrap();
        assert_eq!(repo, RepoRef::new("acme", "widgets"));
        assert_eq!(repo.to_string(), "acme/widgets");

        assert!("acme".parse::<RepoRef>().is_err());
        assert!("a/b/c".parse::<RepoRef>().is_err());
        assert!("/widgets".parse::<RepoRef>().is_err());
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(page_size(Some(0)), 1);
        assert_eq!(page_size(Some(1000)), MAX_PAGE_SIZE);
    }
}
