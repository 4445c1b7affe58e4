//! Worker configuration
//!
//! All runtime settings come from environment variables so the worker can be
//! launched unchanged by the external job scheduler.

use collex_common::{ExportError, Result};
use std::path::PathBuf;

// ============================================================================
// Worker Configuration Constants
// ============================================================================

/// Default page size for search retrieval and staging drain
pub const DEFAULT_PAGE_SIZE: usize = 300;

/// Default scratch directory for archive assembly
pub const DEFAULT_WORK_DIR: &str = "./work";

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Search backend base URL
    pub search_url: String,

    /// Job-tracking service base URL
    pub status_url: String,

    /// Source-system metadata service base URL
    pub metadata_url: String,

    /// Postgres connection string for the staging store
    pub database_url: String,

    /// S3 bucket receiving finished packages
    pub bucket: String,

    /// Optional S3 endpoint override (MinIO and friends)
    pub s3_endpoint: Option<String>,

    /// Page size for retrieval and drain phases
    pub page_size: usize,

    /// Scratch directory for archive assembly
    pub work_dir: PathBuf,

    /// Package description template file
    pub description_template: PathBuf,
}

impl WorkerConfig {
    /// Load configuration from environment variables
    ///
    /// `COLLEX_SEARCH_URL`, `COLLEX_STATUS_URL`, `COLLEX_METADATA_URL`,
    /// `DATABASE_URL` and `COLLEX_BUCKET` are required; the rest have
    /// defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            search_url: require_env("COLLEX_SEARCH_URL")?,
            status_url: require_env("COLLEX_STATUS_URL")?,
            metadata_url: require_env("COLLEX_METADATA_URL")?,
            database_url: require_env("DATABASE_URL")?,
            bucket: require_env("COLLEX_BUCKET")?,
            s3_endpoint: std::env::var("COLLEX_S3_ENDPOINT").ok(),
            page_size: std::env::var("COLLEX_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PAGE_SIZE),
            work_dir: std::env::var("COLLEX_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_WORK_DIR)),
            description_template: std::env::var("COLLEX_DESCRIPTION_TEMPLATE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./templates/package-description.txt")),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| ExportError::Config(format!("Missing required environment variable {}", name)))
}
