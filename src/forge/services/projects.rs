use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{page_size, RepoRef};
use crate::error::Result;
use crate::forge::client::Client;
use crate::forge::page::unwrap_list;
use crate::forge::request::ApiRequest;
use crate::forge::time::FlexTime;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub owner_alias: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub http_transport_url: Option<String>,
    #[serde(default)]
    pub ssh_transport_url: Option<String>,
    #[serde(default)]
    pub created_at: FlexTime,
    #[serde(default)]
    pub updated_at: FlexTime,
}

impl Project {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner_alias, self.alias)
    }

    pub fn visibility(&self) -> &'static str {
        if self.is_private {
            "private"
        } else {
            "public"
        }
    }
}

pub struct Projects<'a> {
    client: &'a Client,
}

impl<'a> Projects<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, cancel: &CancellationToken, repo: &RepoRef) -> Result<Project> {
        self.client.json(cancel, &ApiRequest::get(repo.path(""))).await
    }

    /// Projects the current user owns or is a member of.
    pub async fn list_mine(
        &self,
        cancel: &CancellationToken,
        limit: Option<usize>,
    ) -> Result<Vec<Project>> {
        let req = ApiRequest::get("/project/my")
            .query("page", 0)
            .query("size", page_size(limit));
        let body = self.client.json(cancel, &req).await?;
        Ok(unwrap_list(body, "projectList")?.items)
    }
}
