use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::forge::client::Client;
use crate::forge::request::ApiRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
}

impl User {
    /// Full name when known, the username otherwise.
    pub fn display_name(&self) -> String {
        let full = [self.name.as_deref(), self.surname.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }
}

pub struct Users<'a> {
    client: &'a Client,
}

impl<'a> Users<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// The account the token belongs to.
    pub async fn me(&self, cancel: &CancellationToken) -> Result<User> {
        self.client.json(cancel, &ApiRequest::get("/user/me")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::services::test_support::client_for;
    use mockito::Server;

    #[tokio::test]
    async fn fetches_current_user() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/user/me")
            .with_status(200)
            .with_body(r#"{"id":"u-1","username":"alice","name":"Alice","surname":"Smith"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let me = client.users().me(&CancellationToken::new()).await.unwrap();
        assert_eq!(me.username, "alice");
        assert_eq!(me.display_name(), "Alice Smith");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let user = User {
            username: "bob".into(),
            ..Default::default()
        };
        assert_eq!(user.display_name(), "bob");
    }
}
