use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::pipelines::short_hash;
use super::{page_size, RepoRef};
use crate::error::Result;
use crate::forge::client::Client;
use crate::forge::page::unwrap_list;
use crate::forge::request::{segment, ApiRequest};
use crate::forge::time::FlexTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    #[serde(alias = "id")]
    pub hash: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub created_at: FlexTime,
}

impl Commit {
    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }

    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

pub struct Commits<'a> {
    client: &'a Client,
    repo: &'a RepoRef,
}

impl<'a> Commits<'a> {
    pub(crate) fn new(client: &'a Client, repo: &'a RepoRef) -> Self {
        Self { client, repo }
    }

    /// Newest commits on `branch`, or on the default branch when `None`.
    pub async fn list(
        &self,
        cancel: &CancellationToken,
        branch: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Commit>> {
        let req = ApiRequest::get(self.repo.path("/commits"))
            .query_opt("branch", branch)
            .query("page", 0)
            .query("size", page_size(limit));
        let body = self.client.json(cancel, &req).await?;
        Ok(unwrap_list(body, "commitList")?.items)
    }

    pub async fn get(&self, cancel: &CancellationToken, hash: &str) -> Result<Commit> {
        let req = ApiRequest::get(self.repo.path(&format!("/commit/{}", segment(hash))));
        self.client.json(cancel, &req).await
    }
}
