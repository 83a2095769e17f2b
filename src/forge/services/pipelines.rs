use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{page_size, RepoRef, MAX_PAGE_SIZE};
use crate::error::{GfError, Result};
use crate::forge::client::Client;
use crate::forge::page::unwrap_list;
use crate::forge::request::ApiRequest;
use crate::forge::status::RunStatus;
use crate::forge::time::FlexTime;

/// One CI/CD pipeline as seen on a single poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    #[serde(default)]
    pub id: String,
    pub local_id: u64,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default, alias = "commitHash")]
    pub commit_id: String,
    #[serde(default, rename = "ref", alias = "refName")]
    pub git_ref: String,
    #[serde(default)]
    pub created_at: FlexTime,
    #[serde(default)]
    pub started_at: Option<FlexTime>,
    #[serde(default)]
    pub finished_at: Option<FlexTime>,
    #[serde(default)]
    pub duration: Option<u64>,
}

impl Pipeline {
    pub fn short_commit(&self) -> &str {
        short_hash(&self.commit_id)
    }

    /// Reported duration, else the span between start and finish.
    pub fn duration_secs(&self) -> u64 {
        duration_of(self.duration, self.started_at, self.finished_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub local_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "stageName", alias = "stage")]
    pub stage: String,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub started_at: Option<FlexTime>,
    #[serde(default)]
    pub finished_at: Option<FlexTime>,
    #[serde(default)]
    pub duration: Option<u64>,
}

impl Job {
    pub fn duration_secs(&self) -> u64 {
        duration_of(self.duration, self.started_at, self.finished_at)
    }
}

pub(crate) fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

fn duration_of(reported: Option<u64>, started: Option<FlexTime>, finished: Option<FlexTime>) -> u64 {
    if let Some(secs) = reported {
        return secs;
    }
    match (started, finished) {
        (Some(start), Some(end)) => start.seconds_until(&end),
        _ => 0,
    }
}

pub struct Pipelines<'a> {
    client: &'a Client,
    repo: &'a RepoRef,
}

impl<'a> Pipelines<'a> {
    pub(crate) fn new(client: &'a Client, repo: &'a RepoRef) -> Self {
        Self { client, repo }
    }

    pub async fn list(&self, cancel: &CancellationToken, limit: Option<usize>) -> Result<Vec<Pipeline>> {
        let req = ApiRequest::get(self.repo.path("/cicd/pipeline"))
            .query("page", 0)
            .query("size", page_size(limit));
        let body = self.client.json(cancel, &req).await?;
        Ok(unwrap_list(body, "restPipelineModelList")?.items)
    }

    /// There is no single-pipeline endpoint; the pipeline is looked up in the
    /// most recent page of the list.
    pub async fn get(&self, cancel: &CancellationToken, local_id: u64) -> Result<Pipeline> {
        self.list(cancel, Some(MAX_PAGE_SIZE))
            .await?
            .into_iter()
            .find(|p| p.local_id == local_id)
            .ok_or(GfError::NotFound)
    }

    /// Most recent pipeline, `None` for a project that never ran one.
    pub async fn latest(&self, cancel: &CancellationToken) -> Result<Option<Pipeline>> {
        Ok(self.list(cancel, Some(1)).await?.into_iter().next())
    }

    pub async fn jobs(&self, cancel: &CancellationToken, local_id: u64) -> Result<Vec<Job>> {
        let req = ApiRequest::get(self.repo.path(&format!("/cicd/pipeline/{local_id}/jobs")));
        let body = self.client.json(cancel, &req).await?;
        Ok(unwrap_list(body, "restPipelineJobModelList")?.items)
    }

    pub async fn cancel(&self, cancel: &CancellationToken, local_id: u64) -> Result<()> {
        let req = ApiRequest::post(self.repo.path(&format!("/cicd/pipeline/{local_id}/cancel")));
        self.client.send(cancel, &req).await
    }

    pub async fn restart(&self, cancel: &CancellationToken, local_id: u64) -> Result<()> {
        let req = ApiRequest::post(self.repo.path(&format!("/cicd/pipeline/{local_id}/restart")));
        self.client.send(cancel, &req).await
    }
}
