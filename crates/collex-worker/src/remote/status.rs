//! Job-tracking service client
//!
//! Notifications are fire-and-forget: every failure here surfaces as
//! [`ExportError::Notification`], which the orchestrator logs and swallows.
//! A dead status service must never take a running export down.

use async_trait::async_trait;
use collex_common::{ExportError, JobState, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::{send_with_retry, StatusReporter};

#[derive(Serialize)]
struct StateBody<'a> {
    state: &'a str,
}

#[derive(Serialize)]
struct CompleteBody<'a> {
    download_url: Option<&'a str>,
}

/// HTTP implementation of [`StatusReporter`]
pub struct HttpStatusReporter {
    client: Client,
    base_url: String,
}

impl HttpStatusReporter {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl StatusReporter for HttpStatusReporter {
    async fn report_state(&self, job_id: Uuid, state: JobState) -> Result<()> {
        let url = format!("{}/jobs/{}/state", self.base_url, job_id);
        let body = StateBody {
            state: state.as_str(),
        };

        let response = send_with_retry("status report", || {
            self.client.post(&url).json(&body).send()
        })
        .await
        .map_err(ExportError::Notification)?;

        response
            .error_for_status()
            .map_err(|e| ExportError::Notification(e.to_string()))?;
        debug!(job_id = %job_id, state = state.as_str(), "Reported job state");
        Ok(())
    }

    async fn report_complete(&self, job_id: Uuid, download_url: Option<&str>) -> Result<()> {
        let url = format!("{}/jobs/{}/complete", self.base_url, job_id);
        let body = CompleteBody { download_url };

        let response = send_with_retry("completion report", || {
            self.client.post(&url).json(&body).send()
        })
        .await
        .map_err(ExportError::Notification)?;

        response
            .error_for_status()
            .map_err(|e| ExportError::Notification(e.to_string()))?;
        debug!(job_id = %job_id, download_url = ?download_url, "Reported job completion");
        Ok(())
    }
}
