use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::RepoRef;
use crate::error::Result;
use crate::forge::client::{Client, Download};
use crate::forge::page::unwrap_list;
use crate::forge::request::ApiRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeEntry {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind.to_ascii_uppercase().as_str(), "DIRECTORY" | "DIR" | "TREE")
    }
}

pub struct Files<'a> {
    client: &'a Client,
    repo: &'a RepoRef,
}

impl<'a> Files<'a> {
    pub(crate) fn new(client: &'a Client, repo: &'a RepoRef) -> Self {
        Self { client, repo }
    }

    /// Direct children of `directory` at `commit`; directories sort first.
    pub async fn list(
        &self,
        cancel: &CancellationToken,
        commit: &str,
        directory: &str,
    ) -> Result<Vec<TreeEntry>> {
        let req = ApiRequest::get(self.repo.path("/blob/recursive"))
            .query("commitHash", commit)
            .query("directory", directory.trim_matches('/'))
            .query("depth", 1);
        let body = self.client.json(cancel, &req).await?;
        let mut entries: Vec<TreeEntry> = unwrap_list(body, "blobList")?.items;
        entries.sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    pub async fn download(&self, cancel: &CancellationToken, commit: &str, file: &str) -> Result<Download> {
        let req = ApiRequest::get(self.repo.path("/blob/download"))
            .query("commitHash", commit)
            .query("file", file.trim_start_matches('/'));
        self.client.download(cancel, &req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::services::test_support::{client_for, repo};
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn lists_one_level_with_directories_first() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/project/o/r/blob/recursive")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("commitHash".into(), "master".into()),
                Matcher::UrlEncoded("directory".into(), "src".into()),
                Matcher::UrlEncoded("depth".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(
                json!([
                    {"name": "main.rs", "type": "FILE", "size": 120},
                    {"name": "forge", "type": "DIRECTORY"}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let entries = client
            .files(&repo)
            .list(&CancellationToken::new(), "master", "/src/")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(entries[0].name, "forge");
        assert!(entries[0].is_dir());
        assert_eq!(entries[1].size, Some(120));
    }

    #[tokio::test]
    async fn download_streams_file() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/blob/download")
            .match_query(Matcher::UrlEncoded("file".into(), "docs/guide.md".into()))
            .with_status(200)
            .with_header("content-disposition", "attachment; filename=\"guide.md\"")
            .with_body("guide")
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let cancel = CancellationToken::new();
        let download = client
            .files(&repo)
            .download(&cancel, "master", "/docs/guide.md")
            .await
            .unwrap();
        assert_eq!(download.file_name.as_deref(), Some("guide.md"));
        let mut out = Vec::new();
        download.write_to(&cancel, &mut out, |_| {}).await.unwrap();
        assert_eq!(out, b"guide");
    }
}
