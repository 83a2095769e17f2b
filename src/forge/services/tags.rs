use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{page_size, RepoRef};
use crate::error::{GfError, Result};
use crate::forge::client::Client;
use crate::forge::page::unwrap_list;
use crate::forge::request::{segment, ApiRequest};
use crate::forge::time::FlexTime;
use crate::gitremote::validate_ref_name;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default, alias = "hash")]
    pub commit_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: FlexTime,
}

pub struct Tags<'a> {
    client: &'a Client,
    repo: &'a RepoRef,
}

impl<'a> Tags<'a> {
    pub(crate) fn new(client: &'a Client, repo: &'a RepoRef) -> Self {
        Self { client, repo }
    }

    pub async fn list(&self, cancel: &CancellationToken, limit: Option<usize>) -> Result<Vec<Tag>> {
        let req = ApiRequest::get(self.repo.path("/tag"))
            .query("page", 0)
            .query("size", page_size(limit));
        let body = self.client.json(cancel, &req).await?;
        Ok(unwrap_list(body, "tagList")?.items)
    }

    /// Tags `target` (a branch name or commit hash).
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        name: &str,
        target: &str,
        message: Option<&str>,
    ) -> Result<Tag> {
        validate_ref_name(name).map_err(GfError::InvalidInput)?;
        let body = json!({
            "name": name,
            "commitId": target,
            "message": message.unwrap_or_default(),
        });
        let req = ApiRequest::post(self.repo.path("/tag")).json(&body)?;
        match self.client.execute(cancel, &req).await? {
            Some(tag) => Ok(tag),
            None => Ok(Tag {
                name: name.to_string(),
                commit_id: target.to_string(),
                message: message.map(str::to_string),
                created_at: FlexTime::zero(),
            }),
        }
    }

    pub async fn delete(&self, cancel: &CancellationToken, name: &str) -> Result<()> {
        let req = ApiRequest::delete(self.repo.path(&format!("/tag/{}", segment(name))));
        self.client.send(cancel, &req).await
    }
}
