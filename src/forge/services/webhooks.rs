use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::RepoRef;
use crate::error::{GfError, Result};
use crate::forge::client::Client;
use crate::forge::page::unwrap_list;
use crate::forge::request::{segment, ApiRequest};

macro_rules! event_set {
    ($($field:ident => $key:literal),* $(,)?) => {
        /// Webhook event switches as the server stores them.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(from = "EventsRepr")]
        pub struct EventSet {
            $(
                #[serde(rename = $key)]
                pub $field: bool,
            )*
        }

        impl EventSet {
            pub const KEYS: &'static [&'static str] = &[$($key),*];

            fn flag_mut(&mut self, key: &str) -> Option<&mut bool> {
                match key {
                    $($key => Some(&mut self.$field),)*
                    _ => None,
                }
            }

            fn flag(&self, key: &str) -> bool {
                match key {
                    $($key => self.$field,)*
                    _ => false,
                }
            }
        }
    };
}

event_set! {
    push => "PUSH",
    tag_create => "TAG_CREATE",
    tag_delete => "TAG_DELETE",
    branch_create => "BRANCH_CREATE",
    branch_delete => "BRANCH_DELETE",
    merge_request_create => "MERGE_REQUEST_CREATE",
    merge_request_update => "MERGE_REQUEST_UPDATE",
    merge => "MERGE",
    discussion_create => "DISCUSSION_CREATE",
    issue_create => "ISSUE_CREATE",
    issue_update => "ISSUE_UPDATE",
    pipeline_new => "PIPELINE_NEW",
    pipeline_success => "PIPELINE_SUCCESS",
    pipeline_fail => "PIPELINE_FAIL",
    release_create => "RELEASE_CREATE",
    release_update => "RELEASE_UPDATE",
    release_delete => "RELEASE_DELETE",
    collaborator_add => "COLLABORATOR_ADD",
    collaborator_delete => "COLLABORATOR_DELETE",
    project_update => "PROJECT_UPDATE",
}

/// Short group names accepted on the command line.
const GROUPS: &[(&str, &[&str])] = &[
    ("push", &["PUSH"]),
    ("tag", &["TAG_CREATE", "TAG_DELETE"]),
    ("branch", &["BRANCH_CREATE", "BRANCH_DELETE"]),
    ("merge_request", &["MERGE_REQUEST_CREATE", "MERGE_REQUEST_UPDATE", "MERGE"]),
    ("discussion", &["DISCUSSION_CREATE"]),
    ("issue", &["ISSUE_CREATE", "ISSUE_UPDATE"]),
    ("pipeline", &["PIPELINE_NEW", "PIPELINE_SUCCESS", "PIPELINE_FAIL"]),
    ("release", &["RELEASE_CREATE", "RELEASE_UPDATE", "RELEASE_DELETE"]),
    ("collaborator", &["COLLABORATOR_ADD", "COLLABORATOR_DELETE"]),
    ("project", &["PROJECT_UPDATE"]),
];

/// The server sends either the flag object or a list of enabled keys.
#[derive(Deserialize)]
#[serde(untagged)]
enum EventsRepr {
    Names(Vec<String>),
    Flags(HashMap<String, Value>),
}

impl From<EventsRepr> for EventSet {
    fn from(repr: EventsRepr) -> Self {
        let mut set = EventSet::default();
        let enabled: Vec<String> = match repr {
            EventsRepr::Names(names) => names,
            EventsRepr::Flags(flags) => flags
                .into_iter()
                .filter(|(_, v)| v.as_bool().unwrap_or(false))
                .map(|(k, _)| k)
                .collect(),
        };
        for key in enabled {
            if let Some(flag) = set.flag_mut(&key.to_ascii_uppercase()) {
                *flag = true;
            }
        }
        set
    }
}

impl EventSet {
    pub fn group_names() -> impl Iterator<Item = &'static str> {
        GROUPS.iter().map(|(name, _)| *name)
    }

    /// Turns group names such as `push` or `merge-request` into flags.
    pub fn from_groups<S: AsRef<str>>(groups: &[S]) -> Result<Self> {
        let mut set = EventSet::default();
        for group in groups {
            let wanted = group.as_ref().trim().to_ascii_lowercase().replace('-', "_");
            let keys = GROUPS
                .iter()
                .find(|(name, _)| *name == wanted)
                .map(|(_, keys)| *keys)
                .ok_or_else(|| {
                    GfError::InvalidInput(format!(
                        "unknown webhook event {:?}; valid events: {}",
                        group.as_ref(),
                        Self::group_names().collect::<Vec<_>>().join(", ")
                    ))
                })?;
            for key in keys {
                if let Some(flag) = set.flag_mut(key) {
                    *flag = true;
                }
            }
        }
        Ok(set)
    }

    /// Groups with at least one flag enabled, for display.
    pub fn groups(&self) -> Vec<&'static str> {
        GROUPS
            .iter()
            .filter(|(_, keys)| keys.iter().any(|key| self.flag(key)))
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        !Self::KEYS.iter().any(|key| self.flag(key))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
    #[serde(default)]
    pub events: EventSet,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewWebhook {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub events: EventSet,
}

impl NewWebhook {
    fn validate(&self) -> Result<()> {
        match Url::parse(&self.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(GfError::InvalidInput(format!(
                    "webhook URL must be an http(s) URL, got {:?}",
                    self.url
                )))
            }
        }
        if self.events.is_empty() {
            return Err(GfError::InvalidInput("at least one webhook event is required".into()));
        }
        Ok(())
    }
}

/// Changes to an existing webhook; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct WebhookPatch {
    pub url: Option<String>,
    pub secret: Option<String>,
    pub events: Option<EventSet>,
}

pub struct Webhooks<'a> {
    client: &'a Client,
    repo: &'a RepoRef,
}

impl<'a> Webhooks<'a> {
    pub(crate) fn new(client: &'a Client, repo: &'a RepoRef) -> Self {
        Self { client, repo }
    }

    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Webhook>> {
        let body = self
            .client
            .json(cancel, &ApiRequest::get(self.repo.path("/setting/webhook")))
            .await?;
        Ok(unwrap_list(body, "webhookList")?.items)
    }

    pub async fn get(&self, cancel: &CancellationToken, id: &str) -> Result<Webhook> {
        self.client
            .json(cancel, &ApiRequest::get(self.hook_path(id, "")))
            .await
    }

    pub async fn create(&self, cancel: &CancellationToken, new: &NewWebhook) -> Result<Webhook> {
        new.validate()?;
        let req = ApiRequest::post(self.repo.path("/setting/webhook")).json(new)?;
        self.client.json(cancel, &req).await
    }

    /// Updates go through POST on the webhook itself; PUT is not accepted.
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        id: &str,
        patch: &WebhookPatch,
    ) -> Result<Webhook> {
        let current = self.get(cancel, id).await?;
        let merged = NewWebhook {
            url: patch.url.clone().unwrap_or(current.url),
            secret: patch.secret.clone().or(current.secret),
            events: patch.events.unwrap_or(current.events),
        };
        merged.validate()?;
        let req = ApiRequest::post(self.hook_path(id, "")).json(&merged)?;
        match self.client.execute(cancel, &req).await? {
            Some(updated) => Ok(updated),
            None => self.get(cancel, id).await,
        }
    }

    /// Deletion is a POST to `.../delete`.
    pub async fn delete(&self, cancel: &CancellationToken, id: &str) -> Result<()> {
        self.client
            .send(cancel, &ApiRequest::post(self.hook_path(id, "/delete")))
            .await
    }

    fn hook_path(&self, id: &str, suffix: &str) -> String {
        self.repo
            .path(&format!("/setting/webhook/{}{suffix}", segment(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::services::test_support::{client_for, repo};
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn groups_expand_to_flags() {
        let set = EventSet::from_groups(&["push", "merge-request"]).unwrap();
        assert!(set.push);
        assert!(set.merge_request_create && set.merge_request_update && set.merge);
        assert!(!set.pipeline_fail);
        assert_eq!(set.groups(), vec!["push", "merge_request"]);
    }

    #[test]
    fn unknown_group_is_rejected() {
        let err = EventSet::from_groups(&["push", "deploy"]).unwrap_err();
        assert!(err.to_string().contains("deploy"));
    }

    #[test]
    fn serializes_uppercase_keys() {
        let set = EventSet::from_groups(&["pipeline"]).unwrap();
        let value = serde_json::to_value(set).unwrap();
        assert_eq!(value["PIPELINE_FAIL"], true);
        assert_eq!(value["PUSH"], false);
        assert_eq!(value.as_object().unwrap().len(), EventSet::KEYS.len());
    }

    #[test]
    fn decodes_flags_and_name_lists() {
        let flags: EventSet = serde_json::from_value(json!({"PUSH": true, "TAG_CREATE": false, "NEW_THING": true}))
            .unwrap();
        assert_eq!(flags.groups(), vec!["push"]);

        let names: EventSet = serde_json::from_value(json!(["ISSUE_CREATE", "release_delete"])).unwrap();
        assert_eq!(names.groups(), vec!["issue", "release"]);
    }

    #[test]
    fn partial_group_still_listed() {
        let set = EventSet {
            pipeline_fail: true,
            ..Default::default()
        };
        assert_eq!(set.groups(), vec!["pipeline"]);
    }

    #[tokio::test]
    async fn delete_is_post_to_delete() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/project/o/r/setting/webhook/hook-1/delete")
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        client
            .webhooks(&repo)
            .delete(&CancellationToken::new(), "hook-1")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn update_posts_merged_webhook() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/project/o/r/setting/webhook/hook-1")
            .with_status(200)
            .with_body(r#"{"id":"hook-1","url":"https://ci.example.com/hook","events":{"PUSH":true}}"#)
            .create_async()
            .await;
        let update = server
            .mock("POST", "/project/o/r/setting/webhook/hook-1")
            .match_body(Matcher::PartialJson(json!({
                "url": "https://ci.example.com/hook",
                "events": {"PUSH": false, "PIPELINE_NEW": true}
            })))
            .with_status(200)
            .with_body(r#"{"id":"hook-1","url":"https://ci.example.com/hook","events":["PIPELINE_NEW"]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let repo = repo();
        let patch = WebhookPatch {
            events: Some(EventSet::from_groups(&["pipeline"]).unwrap()),
            ..Default::default()
        };
        let hook = client
            .webhooks(&repo)
            .update(&CancellationToken::new(), "hook-1", &patch)
            .await
            .unwrap();

        update.assert_async().await;
        assert_eq!(hook.events.groups(), vec!["pipeline"]);
    }

    #[tokio::test]
    async fn create_validates_before_sending() {
        let server = Server::new_async().await;
        let client = client_for(&server);
        let repo = repo();
        let hooks = client.webhooks(&repo);
        let cancel = CancellationToken::new();

        let no_events = NewWebhook {
            url: "https://example.com".into(),
            ..Default::default()
        };
        assert!(hooks.create(&cancel, &no_events).await.is_err());

        let bad_url = NewWebhook {
            url: "ftp://example.com".into(),
            events: EventSet::from_groups(&["push"]).unwrap(),
            ..Default::default()
        };
        assert!(hooks.create(&cancel, &bad_url).await.is_err());
    }
}
