use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{page_size, RepoRef, StatusRef, User};
use crate::error::{GfError, Result};
use crate::forge::client::Client;
use crate::forge::page::unwrap_list;
use crate::forge::request::ApiRequest;
use crate::forge::status::IssueState;
use crate::forge::time::FlexTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(default)]
    pub id: String,
    pub local_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: StatusRef,
    #[serde(default, rename = "createdBy", alias = "author")]
    pub author: Option<User>,
    #[serde(default)]
    pub assigned_users: Vec<User>,
    #[serde(default)]
    pub created_at: FlexTime,
    #[serde(default)]
    pub updated_at: FlexTime,
}

impl Issue {
    pub fn state(&self) -> IssueState {
        IssueState::from_server(&self.status.id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IssueFilter {
    #[default]
    Open,
    Closed,
    All,
}

impl IssueFilter {
    fn server_status(self) -> Option<&'static str> {
        match self {
            Self::Open => Some("OPEN"),
            Self::Closed => Some("CLOSED"),
            Self::All => None,
        }
    }

    fn accepts(self, state: &IssueState) -> bool {
        match self {
            Self::Open => *state == IssueState::Open,
            Self::Closed => *state == IssueState::Closed,
            Self::All => true,
        }
    }
}

impl FromStr for IssueFilter {
    type Err = GfError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "all" => Ok(Self::All),
            other => Err(GfError::InvalidInput(format!(
                "unknown state {other:?}: expected open, closed or all"
            ))),
        }
    }
}

impl fmt::Display for IssueFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
}

pub struct Issues<'a> {
    client: &'a Client,
    repo: &'a RepoRef,
}

impl<'a> Issues<'a> {
    pub(crate) fn new(client: &'a Client, repo: &'a RepoRef) -> Self {
        Self { client, repo }
    }

    /// Lists issues in the given state.
    ///
    /// The status filter is passed to the server, but some deployments ignore
    /// it; when the first item contradicts the requested state the whole page
    /// is filtered locally.
    pub async fn list(
        &self,
        cancel: &CancellationToken,
        filter: IssueFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Issue>> {
        let size = page_size(limit);
        let req = ApiRequest::get(self.repo.path("/issue"))
            .query("page", 0)
            .query("size", size)
            .query_opt("status", filter.server_status());

        let body = self.client.json(cancel, &req).await?;
        let mut items: Vec<Issue> = unwrap_list(body, "issueModelList")?.items;

        let contradicts = items.first().is_some_and(|first| !filter.accepts(&first.state()));
        if contradicts {
            debug!("Server ignored the {filter} issue filter, filtering locally");
            items.retain(|issue| filter.accepts(&issue.state()));
        }
        items.truncate(size);
        Ok(items)
    }

    pub async fn get(&self, cancel: &CancellationToken, local_id: u64) -> Result<Issue> {
        self.client.json(cancel, &self.issue_request(local_id, ApiRequest::get)).await
    }

    pub async fn create(&self, cancel: &CancellationToken, new: &NewIssue) -> Result<Issue> {
        if new.title.trim().is_empty() {
            return Err(GfError::InvalidInput("title must not be empty".into()));
        }
        let req = ApiRequest::post(self.repo.path("/issue")).json(new)?;
        self.client.json(cancel, &req).await
    }

    pub async fn close(&self, cancel: &CancellationToken, local_id: u64) -> Result<Issue> {
        self.set_status(cancel, local_id, "CLOSED").await
    }

    pub async fn reopen(&self, cancel: &CancellationToken, local_id: u64) -> Result<Issue> {
        self.set_status(cancel, local_id, "OPEN").await
    }

    /// Fails with `MethodNotAllowed` on servers that do not support deletion.
    pub async fn delete(&self, cancel: &CancellationToken, local_id: u64) -> Result<()> {
        self.client
            .send(cancel, &self.issue_request(local_id, ApiRequest::delete))
            .await
    }

    /// The edit endpoint wants the whole issue, so title and description are
    /// carried over from the current version.
    async fn set_status(&self, cancel: &CancellationToken, local_id: u64, status: &str) -> Result<Issue> {
        let current = self.get(cancel, local_id).await?;
        let body = json!({
            "title": current.title,
            "description": current.description.unwrap_or_default(),
            "status": {"id": status},
        });
        let req = self.issue_request(local_id, ApiRequest::put).json(&body)?;
        match self.client.execute(cancel, &req).await? {
            Some(updated) => Ok(updated),
            None => self.get(cancel, local_id).await,
        }
    }

    fn issue_request(&self, local_id: u64, method: fn(String) -> ApiRequest) -> ApiRequest {
        method(self.repo.path(&format!("/issue/{local_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::services::test_support::{client_for, repo};
    use mockito::{Matcher, Server};

    fn issue_json(local_id: u64, status: &str) -> serde_json::Value {
        json!({
            "id": format!("issue-{local_id}"),
            "localId": local_id,
            "title": format!("Issue {local_id}"),
            "description": "details",
            "status": {"id": status, "title": status},
            "createdAt": "2024-02-10T08:30:00.000001"
        })
    }

    #[tokio::test]
    async fn honoured_server_filter_is_returned_as_is() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/project/o/r/issue")
            .match_query(Matcher::UrlEncoded("status".into(), "CLOSED".into()))
            .with_status(200)
            .with_body(
                json!({"_embedded": {"issueModelList": [issue_json(1, "RESOLVED"), issue_json(2, "DONE")]}})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let issues = client
            .issues(&repo)
            .list(&CancellationToken::new(), IssueFilter::Closed, None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.state() == IssueState::Closed));
    }

    #[tokio::test]
    async fn ignored_server_filter_is_applied_locally() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/issue")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"_embedded": {"issueModelList": [
                    issue_json(1, "CLOSED"),
                    issue_json(2, "IN_PROGRESS"),
                    issue_json(3, "OPEN")
                ]}})
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let issues = client
            .issues(&repo)
            .list(&CancellationToken::new(), IssueFilter::Open, None)
            .await
            .unwrap();

        let ids: Vec<u64> = issues.iter().map(|i| i.local_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn close_keeps_title_and_description() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/issue/4")
            .with_status(200)
            .with_body(issue_json(4, "OPEN").to_string())
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/project/o/r/issue/4")
            .match_body(Matcher::Json(json!({
                "title": "Issue 4",
                "description": "details",
                "status": {"id": "CLOSED"}
            })))
            .with_status(200)
            .with_body(issue_json(4, "CLOSED").to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let issue = client
            .issues(&repo)
            .close(&CancellationToken::new(), 4)
            .await
            .unwrap();

        put.assert_async().await;
        assert_eq!(issue.state(), IssueState::Closed);
    }

    #[tokio::test]
    async fn delete_surfaces_method_not_allowed() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", "/project/o/r/issue/9")
            .with_status(405)
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let err = client
            .issues(&repo)
            .delete(&CancellationToken::new(), 9)
            .await
            .unwrap_err();
        assert!(err.is_method_not_allowed());
    }
}
