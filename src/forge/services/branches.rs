use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{page_size, RepoRef};
use crate::error::{GfError, Result};
use crate::forge::client::Client;
use crate::forge::page::unwrap_list;
use crate::forge::request::{segment, ApiRequest};
use crate::gitremote::validate_ref_name;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default, alias = "commitId")]
    pub hash: String,
    #[serde(default, alias = "default")]
    pub is_default: bool,
}

pub struct Branches<'a> {
    client: &'a Client,
    repo: &'a RepoRef,
}

impl<'a> Branches<'a> {
    pub(crate) fn new(client: &'a Client, repo: &'a RepoRef) -> Self {
        Self { client, repo }
    }

    pub async fn list(&self, cancel: &CancellationToken, limit: Option<usize>) -> Result<Vec<Branch>> {
        let req = ApiRequest::get(self.repo.path("/branch"))
            .query("page", 0)
            .query("size", page_size(limit));
        let body = self.client.json(cancel, &req).await?;
        Ok(unwrap_list(body, "branchList")?.items)
    }

    /// Creates `name` from the tip of `source`.
    pub async fn create(&self, cancel: &CancellationToken, name: &str, source: &str) -> Result<Branch> {
        validate_ref_name(name).map_err(GfError::InvalidInput)?;
        let body = json!({"newBranch": name, "sourceBranch": source});
        let req = ApiRequest::post(self.repo.path("/branch")).json(&body)?;
        match self.client.execute(cancel, &req).await? {
            Some(branch) => Ok(branch),
            None => Ok(Branch {
                name: name.to_string(),
                hash: String::new(),
                is_default: false,
            }),
        }
    }

    pub async fn delete(&self, cancel: &CancellationToken, name: &str) -> Result<()> {
        let req = ApiRequest::delete(self.repo.path(&format!("/branch/{}", segment(name))));
        self.client.send(cancel, &req).await
    }
}
