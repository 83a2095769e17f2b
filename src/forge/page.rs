//! HAL-style list envelopes.
//!
//! List endpoints wrap their items as `{"_embedded": {"<key>": [...]}, "page": {...}}`.
//! An empty result frequently omits `_embedded` entirely, and a few endpoints
//! answer with a bare array instead; both are accepted here.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u64,
    #[serde(default)]
    pub number: u64,
}

/// Items of one list response plus its pagination block, if any.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: Option<PageInfo>,
}

impl<T> Paged<T> {
    pub fn total(&self) -> u64 {
        self.page
            .map(|p| p.total_elements)
            .unwrap_or(self.items.len() as u64)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "_embedded", default)]
    embedded: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    page: Option<PageInfo>,
}

/// Unwraps the list stored under `_embedded.<key>`.
pub fn unwrap_list<T: DeserializeOwned>(body: Value, key: &str) -> Result<Paged<T>, serde_json::Error> {
    if body.is_array() {
        return Ok(Paged {
            items: serde_json::from_value(body)?,
            page: None,
        });
    }

    let envelope: Envelope = serde_json::from_value(body)?;
    let items = match envelope.embedded.and_then(|mut map| map.remove(key)) {
        Some(list) => serde_json::from_value(list)?,
        None => Vec::new(),
    };

    Ok(Paged {
        items,
        page: envelope.page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    #[test]
    fn unwraps_embedded_list() {
        let body = json!({
            "_embedded": {"branchList": [{"name": "main"}, {"name": "dev"}]},
            "page": {"size": 20, "totalElements": 2, "totalPages": 1, "number": 0}
        });
        let paged: Paged<Item> = unwrap_list(body, "branchList").unwrap();
        assert_eq!(paged.items.len(), 2);
        assert_eq!(paged.items[1].name, "dev");
        assert_eq!(paged.total(), 2);
    }

    #[test]
    fn missing_embedded_is_empty() {
        let body = json!({"page": {"size": 20, "totalElements": 0, "totalPages": 0, "number": 0}});
        let paged: Paged<Item> = unwrap_list(body, "branchList").unwrap();
        assert!(paged.items.is_empty());
        assert_eq!(paged.total(), 0);
    }

    #[test]
    fn accepts_bare_arrays() {
        let paged: Paged<Item> = unwrap_list(json!([{"name": "v1"}]), "releaseTagModelList").unwrap();
        assert_eq!(paged.items, vec![Item { name: "v1".into() }]);
        assert!(paged.page.is_none());
        assert_eq!(paged.total(), 1);
    }
}
