use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{page_size, RepoRef, StatusRef, User, MAX_PAGE_SIZE};
use crate::error::{GfError, Result};
use crate::forge::client::Client;
use crate::forge::page::unwrap_list;
use crate::forge::request::ApiRequest;
use crate::forge::status::MergeRequestState;
use crate::forge::time::FlexTime;

/// Raw statuses that mean the merge request is no longer open.
const NOT_OPEN: [&str; 3] = ["MERGED", "CANCELED", "CLOSED"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl BranchRef {
    pub fn name(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    #[serde(default)]
    pub id: String,
    pub local_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_branch: BranchRef,
    #[serde(default)]
    pub target_branch: BranchRef,
    #[serde(default)]
    pub status: StatusRef,
    #[serde(default, rename = "createdBy", alias = "author")]
    pub author: Option<User>,
    #[serde(default)]
    pub created_at: FlexTime,
    #[serde(default)]
    pub updated_at: FlexTime,
    #[serde(default)]
    pub can_merge: bool,
    #[serde(default)]
    pub has_conflicts: bool,
}

impl MergeRequest {
    pub fn state(&self) -> MergeRequestState {
        MergeRequestState::from_server(&self.status.id)
    }

    fn is_open_raw(&self) -> bool {
        let raw = self.status.id.to_ascii_uppercase();
        !NOT_OPEN.contains(&raw.as_str())
    }
}

/// Which merge requests `list` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeRequestFilter {
    #[default]
    Open,
    Merged,
    Closed,
    All,
}

impl FromStr for MergeRequestFilter {
    type Err = GfError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "merged" => Ok(Self::Merged),
            "closed" => Ok(Self::Closed),
            "all" => Ok(Self::All),
            other => Err(GfError::InvalidInput(format!(
                "unknown state {other:?}: expected open, merged, closed or all"
            ))),
        }
    }
}

impl fmt::Display for MergeRequestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Merged => "merged",
            Self::Closed => "closed",
            Self::All => "all",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewMergeRequest {
    pub title: String,
    pub description: String,
    pub source_branch: String,
    pub target_branch: String,
    pub remove_source_branch: bool,
}

pub struct MergeRequests<'a> {
    client: &'a Client,
    repo: &'a RepoRef,
}

impl<'a> MergeRequests<'a> {
    pub(crate) fn new(client: &'a Client, repo: &'a RepoRef) -> Self {
        Self { client, repo }
    }

    /// Lists merge requests in the given state.
    ///
    /// The server filters merged and closed requests itself but has no filter
    /// for open ones, so those are fetched unfiltered and narrowed here.
    pub async fn list(
        &self,
        cancel: &CancellationToken,
        filter: MergeRequestFilter,
        limit: Option<usize>,
    ) -> Result<Vec<MergeRequest>> {
        let size = page_size(limit);
        let req = ApiRequest::get(self.repo.path("/merge-request/list")).query("page", 0);
        let req = match filter {
            MergeRequestFilter::Open => req.query("size", MAX_PAGE_SIZE),
            MergeRequestFilter::All => req.query("size", size),
            MergeRequestFilter::Merged => req.query("size", size).query("status", "MERGED"),
            MergeRequestFilter::Closed => req.query("size", size).query("status", "CANCELED"),
        };

        let body = self.client.json(cancel, &req).await?;
        let mut items: Vec<MergeRequest> = unwrap_list(body, "mergeRequestModelList")?.items;

        if filter == MergeRequestFilter::Open {
            let before = items.len();
            items.retain(MergeRequest::is_open_raw);
            debug!("Kept {} of {before} merge requests as open", items.len());
        }
        items.truncate(size);
        Ok(items)
    }

    pub async fn get(&self, cancel: &CancellationToken, local_id: u64) -> Result<MergeRequest> {
        let req = ApiRequest::get(self.repo.path(&format!("/merge-request/{local_id}")));
        self.client.json(cancel, &req).await
    }

    /// Opens a merge request within the same project.
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        new: &NewMergeRequest,
    ) -> Result<MergeRequest> {
        if new.title.trim().is_empty() {
            return Err(GfError::InvalidInput("title must not be empty".into()));
        }
        if new.source_branch == new.target_branch {
            return Err(GfError::InvalidInput(format!(
                "source and target branch are both {:?}",
                new.source_branch
            )));
        }

        let project = self.client.projects().get(cancel, self.repo).await?;
        let body = json!({
            "title": new.title,
            "description": new.description,
            "sourceBranch": {"id": new.source_branch},
            "targetBranch": {"id": new.target_branch},
            "sourceProject": {"id": project.id},
            "targetProject": {"id": project.id},
            "removeSourceBranch": new.remove_source_branch,
        });
        let req = ApiRequest::post(self.repo.path("/merge-request")).json(&body)?;
        self.client.json(cancel, &req).await
    }

    pub async fn merge(&self, cancel: &CancellationToken, local_id: u64) -> Result<()> {
        let req = ApiRequest::post(self.repo.path(&format!("/merge-request/{local_id}/merge")));
        self.client.send(cancel, &req).await
    }

    pub async fn close(&self, cancel: &CancellationToken, local_id: u64) -> Result<()> {
        let req = ApiRequest::post(self.repo.path(&format!("/merge-request/{local_id}/cancel")));
        self.client.send(cancel, &req).await
    }
}
