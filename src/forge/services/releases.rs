use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{page_size, RepoRef, User};
use crate::error::{GfError, Result};
use crate::forge::client::{safe_file_name, Client, Download};
use crate::forge::page::unwrap_list;
use crate::forge::request::{segment, ApiRequest};
use crate::forge::time::FlexTime;

const LIST_KEY: &str = "releaseTagModelList";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub tag_name: String,
    #[serde(default, alias = "draft")]
    pub is_draft: bool,
    #[serde(default, rename = "preRelease", alias = "isPrerelease")]
    pub is_prerelease: bool,
    #[serde(default)]
    pub created_at: FlexTime,
    #[serde(default)]
    pub published_at: Option<FlexTime>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub attachment_files: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseAsset {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "fileName")]
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRelease {
    pub tag_name: String,
    pub title: String,
    pub description: String,
    pub pre_release: bool,
    pub is_draft: bool,
}

/// Fields to change on an existing release; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ReleasePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub pre_release: Option<bool>,
}

/// Complete body the edit endpoint insists on.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseUpdate<'a> {
    title: &'a str,
    description: &'a str,
    tag_name: &'a str,
    pre_release: bool,
}

pub struct Releases<'a> {
    client: &'a Client,
    repo: &'a RepoRef,
}

impl<'a> Releases<'a> {
    pub(crate) fn new(client: &'a Client, repo: &'a RepoRef) -> Self {
        Self { client, repo }
    }

    /// Releases on the first page plus the server's total count.
    pub async fn list_with_total(
        &self,
        cancel: &CancellationToken,
        limit: Option<usize>,
    ) -> Result<(Vec<Release>, u64)> {
        let req = ApiRequest::get(self.repo.path("/release"))
            .query("page", 0)
            .query("size", page_size(limit));
        let body = self.client.json(cancel, &req).await?;
        let paged = unwrap_list(body, LIST_KEY)?;
        let total = paged.total();
        Ok((paged.items, total))
    }

    /// Looks a release up by tag; the server answers with a list.
    pub async fn get(&self, cancel: &CancellationToken, tag: &str) -> Result<Release> {
        let req = ApiRequest::get(self.repo.path("/release")).query("tagName", tag);
        let body = self.client.json(cancel, &req).await?;
        unwrap_list::<Release>(body, LIST_KEY)?
            .items
            .into_iter()
            .find(|r| r.tag_name == tag)
            .ok_or(GfError::NotFound)
    }

    pub async fn create(&self, cancel: &CancellationToken, new: &NewRelease) -> Result<Release> {
        if new.tag_name.trim().is_empty() {
            return Err(GfError::InvalidInput("tag name must not be empty".into()));
        }
        let mut new = new.clone();
        if new.title.trim().is_empty() {
            new.title = new.tag_name.clone();
        }
        let req = ApiRequest::post(self.repo.path("/release")).json(&new)?;
        self.client.json(cancel, &req).await
    }

    /// Fetches the release and sends it back whole with `patch` applied.
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        tag: &str,
        patch: &ReleasePatch,
    ) -> Result<Release> {
        let current = self.get(cancel, tag).await?;
        let body = ReleaseUpdate {
            title: patch.title.as_deref().unwrap_or(&current.title),
            description: patch
                .description
                .as_deref()
                .or(current.description.as_deref())
                .unwrap_or_default(),
            tag_name: &current.tag_name,
            pre_release: patch.pre_release.unwrap_or(current.is_prerelease),
        };
        let req = ApiRequest::put(self.release_path(&current, "")).json(&body)?;
        match self.client.execute(cancel, &req).await? {
            Some(updated) => Ok(updated),
            None => self.get(cancel, tag).await,
        }
    }

    pub async fn delete(&self, cancel: &CancellationToken, tag: &str) -> Result<()> {
        let release = self.get(cancel, tag).await?;
        let req = ApiRequest::delete(self.release_path(&release, ""));
        self.client.send(cancel, &req).await
    }

    /// Attaches a local file to the release. Returns the stored asset name.
    pub async fn upload(&self, cancel: &CancellationToken, tag: &str, file: &Path) -> Result<String> {
        let name = file
            .to_str()
            .and_then(safe_file_name)
            .ok_or_else(|| GfError::InvalidInput(format!("invalid file name: {}", file.display())))?;
        let release = self.get(cancel, tag).await?;
        let reader = tokio::fs::File::open(file).await?;
        self.client
            .upload(cancel, &self.release_path(&release, "/file"), "files", &name, reader)
            .await?;
        Ok(name)
    }

    /// Starts downloading the asset called `name` from the release.
    pub async fn download_asset(
        &self,
        cancel: &CancellationToken,
        tag: &str,
        name: &str,
    ) -> Result<(ReleaseAsset, Download)> {
        let release = self.get(cancel, tag).await?;
        let asset = release
            .attachment_files
            .iter()
            .find(|a| a.name == name)
            .cloned()
            .ok_or(GfError::NotFound)?;
        let path = self.release_path(&release, &format!("/file/{}", segment(&asset.id)));
        let download = self.client.download(cancel, &ApiRequest::get(path)).await?;
        Ok((asset, download))
    }

    fn release_path(&self, release: &Release, suffix: &str) -> String {
        self.repo
            .path(&format!("/release/{}{suffix}", segment(&release.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::services::test_support::{client_for, repo};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn release_list(tag: &str) -> String {
        json!({"_embedded": {"releaseTagModelList": [{
            "id": "rel-uuid",
            "title": "First",
            "description": "Initial release",
            "tagName": tag,
            "preRelease": true,
            "createdAt": "2024-01-01T00:00:00Z",
            "attachmentFiles": [{"id": "file-1", "name": "app.tar.gz", "size": 3}]
        }]}})
        .to_string()
    }

    #[tokio::test]
    async fn update_sends_complete_representation() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/release")
            .match_query(Matcher::UrlEncoded("tagName".into(), "v1.0.0".into()))
            .with_status(200)
            .with_body(release_list("v1.0.0"))
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/project/o/r/release/rel-uuid")
            .match_body(Matcher::Json(json!({
                "title": "Stable",
                "description": "Initial release",
                "tagName": "v1.0.0",
                "preRelease": true
            })))
            .with_status(200)
            .with_body(r#"{"id":"rel-uuid","title":"Stable","tagName":"v1.0.0","preRelease":true}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let patch = ReleasePatch {
            title: Some("Stable".into()),
            ..Default::default()
        };
        let updated = client
            .releases(&repo)
            .update(&CancellationToken::new(), "v1.0.0", &patch)
            .await
            .unwrap();

        put.assert_async().await;
        assert_eq!(updated.title, "Stable");
    }

    #[tokio::test]
    async fn missing_tag_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/release")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"page":{"totalElements":0}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let err = client
            .releases(&repo)
            .delete(&CancellationToken::new(), "v9")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_uses_release_uuid() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/release")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(release_list("v2"))
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/project/o/r/release/rel-uuid")
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        client
            .releases(&repo)
            .delete(&CancellationToken::new(), "v2")
            .await
            .unwrap();
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn list_reports_total() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/release")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "_embedded": {"releaseTagModelList": [{"tagName": "v3"}, {"tagName": "v2"}]},
                    "page": {"size": 2, "totalElements": 7, "totalPages": 4, "number": 0}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let (items, total) = client
            .releases(&repo)
            .list_with_total(&CancellationToken::new(), Some(2))
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(total, 7);
    }

    #[tokio::test]
    async fn upload_posts_file_to_release() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/release")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(release_list("v1"))
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/project/o/r/release/rel-uuid/file")
            .match_body(Matcher::Regex(r#"filename="notes.txt""#.into()))
            .with_status(200)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let client = client_for(&server);
        let repo = repo();
        let name = client
            .releases(&repo)
            .upload(&CancellationToken::new(), "v1", &path)
            .await
            .unwrap();

        upload.assert_async().await;
        assert_eq!(name, "notes.txt");
    }

    #[tokio::test]
    async fn download_asset_by_name() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/release")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(release_list("v1"))
            .create_async()
            .await;
        server
            .mock("GET", "/project/o/r/release/rel-uuid/file/file-1")
            .with_status(200)
            .with_body("abc")
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let cancel = CancellationToken::new();
        let releases = client.releases(&repo);
        let (asset, download) = releases.download_asset(&cancel, "v1", "app.tar.gz").await.unwrap();
        assert_eq!(asset.size, Some(3));
        let mut out = Vec::new();
        download.write_to(&cancel, &mut out, |_| {}).await.unwrap();
        assert_eq!(out, b"abc");

        let err = releases.download_asset(&cancel, "v1", "missing.zip").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
