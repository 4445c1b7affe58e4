//! Package upload to S3-compatible object storage
//!
//! Puts the finished package under `exports/<job_id>/` and returns a
//! presigned GET URL as the download link handed back to the job-tracking
//! service. Upload failures are fatal to the job.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use collex_common::{ExportError, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::PackageUploader;

/// Presigned download URL lifetime (7 days, the S3 maximum)
const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// S3 implementation of [`PackageUploader`]
pub struct S3PackageUploader {
    client: Client,
    bucket: String,
}

impl S3PackageUploader {
    /// Build from ambient AWS credentials and an optional endpoint override
    /// (MinIO and other S3-compatible stores)
    pub async fn new(bucket: String, endpoint: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = &endpoint {
            loader = loader.endpoint_url(endpoint.as_str());
        }
        let shared_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            // Path-style requests keep bucket-in-host DNS out of the picture
            // for self-hosted endpoints.
            .force_path_style(endpoint.is_some())
            .build();

        debug!(bucket = %bucket, endpoint = ?endpoint, "Initialized package uploader");
        Self {
            client: Client::from_conf(s3_config),
            bucket,
        }
    }
}

#[async_trait]
impl PackageUploader for S3PackageUploader {
    async fn upload(&self, path: &Path, job_id: Uuid) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ExportError::Upload(format!("package path has no file name: {}", path.display())))?;
        let key = format!("exports/{}/{}", job_id, file_name);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| ExportError::Upload(format!("cannot read package: {}", e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| ExportError::Upload(format!("put object failed: {}", e)))?;

        let presigning = PresigningConfig::expires_in(DOWNLOAD_URL_TTL)
            .map_err(|e| ExportError::Upload(e.to_string()))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| ExportError::Upload(format!("presigning failed: {}", e)))?;

        let url = presigned.uri().to_string();
        info!(job_id = %job_id, key = %key, "Uploaded package");
        Ok(url)
    }
}
