//! Search backend client and cursor
//!
//! Retrieval is keyset-paginated: every page request carries the previous
//! page's last record id and the backend returns records sorted by unique
//! id. An empty page signals exhaustion. The backend's stable id order is a
//! correctness precondition the cursor cannot verify; an unstable order can
//! skip or repeat records.

use collex_common::{ExportError, Result, SearchParam};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default timeout for search backend requests in seconds.
/// Can be overridden via COLLEX_SEARCH_TIMEOUT_SECS.
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 120;

/// One raw event substructure on a retrieved record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// One raw agent substructure on a retrieved record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAgent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// One raw relationship substructure on a retrieved record
///
/// Relationships of type `hasMedia` reference media records that live in a
/// separate index and are resolved in a second retrieval pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRelationship {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub relationship_type: Option<String>,
    #[serde(default)]
    pub related_id: Option<String>,
}

/// A raw record as returned by the search backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub agents: Vec<RawAgent>,
    #[serde(default)]
    pub relationships: Vec<RawRelationship>,
}

/// A media record from the media index, fetched by id in the second pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMedia {
    pub id: String,
    #[serde(default)]
    pub access_uri: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    kind: &'a str,
    filters: &'a [SearchParam],
    #[serde(skip_serializing_if = "Option::is_none")]
    after_id: Option<&'a str>,
    size: usize,
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    kind: &'a str,
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope<T> {
    hits: Vec<T>,
}

/// HTTP client for the search backend
pub struct SearchClient {
    client: Client,
    base_url: String,
}

impl SearchClient {
    /// Create a new search client
    pub fn new(base_url: String) -> Result<Self> {
        let timeout_secs = std::env::var("COLLEX_SEARCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SEARCH_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExportError::Retrieval(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Fetch one page of records matching the filter conjunction
    ///
    /// Filters with a value are case-insensitive equality conditions;
    /// filters without a value require the field to be absent. `after_id`
    /// is `None` for the first page.
    pub async fn fetch(
        &self,
        kind: &str,
        filters: &[SearchParam],
        after_id: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<RawRecord>> {
        let url = format!("{}/search", self.base_url);
        let request = SearchRequest {
            kind,
            filters,
            after_id,
            size: page_size,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExportError::Retrieval(format!("search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ExportError::Retrieval(format!(
                "search backend returned {}",
                response.status()
            )));
        }

        let envelope: HitsEnvelope<RawRecord> = response
            .json()
            .await
            .map_err(|e| ExportError::Retrieval(format!("malformed search response: {}", e)))?;

        Ok(envelope.hits)
    }

    /// Bulk lookup by id, used by the media resolution pass
    ///
    /// Ids the backend does not know are simply missing from the result;
    /// dangling references are not an error.
    pub async fn fetch_media_by_ids(&self, ids: &[String]) -> Result<Vec<RawMedia>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/lookup", self.base_url);
        let request = LookupRequest { kind: "media", ids };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExportError::Retrieval(format!("media lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ExportError::Retrieval(format!(
                "media lookup returned {}",
                response.status()
            )));
        }

        let envelope: HitsEnvelope<RawMedia> = response
            .json()
            .await
            .map_err(|e| ExportError::Retrieval(format!("malformed lookup response: {}", e)))?;

        Ok(envelope.hits)
    }
}

/// Forward-only cursor over a filtered search
///
/// Wraps [`SearchClient::fetch`] with the job's filters, threading the last
/// record id of each page into the next request.
pub struct SearchCursor<'a> {
    client: &'a SearchClient,
    target_kind: &'a str,
    filters: &'a [SearchParam],
    page_size: usize,
    after_id: Option<String>,
    exhausted: bool,
}

impl<'a> SearchCursor<'a> {
    pub fn new(
        client: &'a SearchClient,
        target_kind: &'a str,
        filters: &'a [SearchParam],
        page_size: usize,
    ) -> Self {
        Self {
            client,
            target_kind,
            filters,
            page_size,
            after_id: None,
            exhausted: false,
        }
    }

    /// Fetch the next page, or `None` once the result set is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawRecord>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .client
            .fetch(
                self.target_kind,
                self.filters,
                self.after_id.as_deref(),
                self.page_size,
            )
            .await?;

        match page.last() {
            Some(last) => {
                self.after_id = Some(last.id.clone());
                Ok(Some(page))
            },
            None => {
                self.exhausted = true;
                Ok(None)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hit(id: &str) -> serde_json::Value {
        serde_json::json!({ "id": id, "attributes": { "scientificName": "Bufo bufo" } })
    }

    #[tokio::test]
    async fn test_cursor_threads_after_id_and_terminates() {
        let server = MockServer::start().await;

        // First page: no after_id
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({ "size": 2 })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "hits": [hit("a"), hit("b")] })),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        // Second page: keyed after "b", returns the tail
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({ "after_id": "b" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "hits": [hit("c")] })),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        // Everything after "c" is empty
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({ "after_id": "c" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "hits": [] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = SearchClient::new(server.uri()).unwrap();
        let filters = vec![SearchParam::equals("country", "Estonia")];
        let mut cursor = SearchCursor::new(&client, "specimen", &filters, 2);

        let mut seen = Vec::new();
        while let Some(page) = cursor.next_page().await.unwrap() {
            seen.extend(page.into_iter().map(|r| r.id));
        }

        assert_eq!(seen, vec!["a", "b", "c"]);
        // Cursor stays exhausted without further backend calls
        assert!(cursor.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_retrieval_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = SearchClient::new(server.uri()).unwrap();
        let err = client.fetch("specimen", &[], None, 10).await.unwrap_err();
        assert!(matches!(err, ExportError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_empty_id_list_skips_lookup() {
        // No server at all: the call must short-circuit before any request
        let client = SearchClient::new("http://127.0.0.1:1".to_string()).unwrap();
        let media = client.fetch_media_by_ids(&[]).await.unwrap();
        assert!(media.is_empty());
    }

    #[test]
    fn test_absent_filter_serializes_null_value() {
        let request = SearchRequest {
            kind: "specimen",
            filters: &[SearchParam::absent("media_url")],
            after_id: None,
            size: 5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["filters"][0]["value"], serde_json::Value::Null);
        assert!(json.get("after_id").is_none());
    }
}
