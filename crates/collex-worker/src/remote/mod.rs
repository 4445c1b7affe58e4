//! External collaborators
//!
//! The orchestrator talks to four outside parties: the job-tracking service
//! (status), the source-system metadata service, object storage (package
//! upload) and a template renderer for the package description. Each is a
//! trait so tests can substitute fakes; the production implementations live
//! in the submodules.

pub mod metadata;
pub mod render;
pub mod status;
pub mod upload;

use async_trait::async_trait;
use collex_common::{JobState, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

pub use metadata::HttpMetadataProvider;
pub use render::FileTemplateRenderer;
pub use status::HttpStatusReporter;
pub use upload::S3PackageUploader;

/// Job-tracking service notifications; fire-and-forget from the job's view
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report_state(&self, job_id: Uuid, state: JobState) -> Result<()>;
    async fn report_complete(&self, job_id: Uuid, download_url: Option<&str>) -> Result<()>;
}

/// Source-system metadata document retrieval
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn metadata_document(&self, source_system_id: &str) -> Result<String>;
}

/// Opaque model-to-text rendering for the package description
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, model: &BTreeMap<String, String>) -> Result<String>;
}

/// Finished package upload; returns the retrievable download URL
#[async_trait]
pub trait PackageUploader: Send + Sync {
    async fn upload(&self, path: &Path, job_id: Uuid) -> Result<String>;
}

/// Retry attempts for transiently failing collaborator calls
const RETRY_ATTEMPTS: u32 = 3;

/// Fixed delay between retry attempts
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Send a request with bounded fixed-backoff retry
///
/// Retries only transport errors and 5xx responses; any other response is
/// handed back to the caller untouched (a 4xx is a contract problem a
/// retry will not fix). Exhausting the attempts yields the last failure as
/// an error string for the caller to wrap in its own error kind.
pub(crate) async fn send_with_retry<F, Fut>(
    what: &str,
    send: F,
) -> std::result::Result<reqwest::Response, String>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = reqwest::Result<reqwest::Response>>,
{
    let mut last_failure = String::new();

    for attempt in 1..=RETRY_ATTEMPTS {
        match send().await {
            Ok(response) if response.status().is_server_error() => {
                last_failure = format!("{} returned {}", what, response.status());
            },
            Ok(response) => return Ok(response),
            Err(e) => {
                last_failure = format!("{} failed: {}", what, e);
            },
        }

        if attempt < RETRY_ATTEMPTS {
            warn!(
                attempt,
                failure = %last_failure,
                "Transient collaborator failure, retrying"
            );
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }

    Err(format!(
        "{} (after {} attempts)",
        last_failure, RETRY_ATTEMPTS
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_retry_recovers_from_transient_5xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/flaky", server.uri());
        let response = send_with_retry("flaky", || client.get(&url).send())
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    #[tokio::test]
    async fn test_retry_exhaustion_surfaces_last_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/down", server.uri());
        let err = send_with_retry("down", || client.get(&url).send())
            .await
            .unwrap_err();
        assert!(err.contains("500"));
        assert!(err.contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/bad", server.uri());
        let response = send_with_retry("bad", || client.get(&url).send())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }
}
