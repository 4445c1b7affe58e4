//! Source-system metadata client
//!
//! Derived jobs embed the upstream system's metadata document verbatim in
//! the package. The document is only partially parsed: the `<title>`
//! element feeds the package description model, the rest is opaque.

use async_trait::async_trait;
use collex_common::{ExportError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tracing::debug;

use super::{send_with_retry, MetadataProvider};

/// HTTP implementation of [`MetadataProvider`]
pub struct HttpMetadataProvider {
    client: Client,
    base_url: String,
}

impl HttpMetadataProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    async fn metadata_document(&self, source_system_id: &str) -> Result<String> {
        let url = format!(
            "{}/source-systems/{}/metadata",
            self.base_url, source_system_id
        );

        let response = send_with_retry("metadata fetch", || self.client.get(&url).send())
            .await
            .map_err(ExportError::Metadata)?;

        let response = response
            .error_for_status()
            .map_err(|e| ExportError::Metadata(e.to_string()))?;

        let document = response
            .text()
            .await
            .map_err(|e| ExportError::Metadata(e.to_string()))?;
        debug!(source_system_id, bytes = document.len(), "Fetched metadata document");
        Ok(document)
    }
}

/// Pull the first `<title>` text out of a metadata document
///
/// Returns `None` for documents without a title or with malformed XML; the
/// caller falls back to the source system id.
pub fn extract_title(document: &str) -> Option<String> {
    let mut reader = Reader::from_str(document);
    let mut in_title = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"title" => in_title = true,
            Ok(Event::Text(t)) if in_title => {
                return t.unescape().ok().map(|s| s.trim().to_string());
            },
            Ok(Event::Eof) | Err(_) => return None,
            _ => {},
        }
    }
}
