//! Error types for Collex

use thiserror::Error;

/// Result type alias for Collex operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Main error type for the export pipeline
///
/// Every variant except [`ExportError::Notification`] is fatal to the job:
/// the pipeline aborts, staging is cleaned up and the job is reported as
/// failed. Notification failures are logged and swallowed by the caller.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Search retrieval error: {0}")]
    Retrieval(String),

    #[error("Staging store error: {0}")]
    Staging(String),

    #[error("Schema violation for kind '{kind}': expected {expected} columns, got {actual}")]
    SchemaViolation {
        kind: String,
        expected: usize,
        actual: usize,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Archive writer is closed; no further writes are accepted")]
    WriterClosed,

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Status notification error: {0}")]
    Notification(String),

    #[error("Source system metadata error: {0}")]
    Metadata(String),

    #[error("Template rendering error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExportError {
    /// Whether this error may abort the job
    ///
    /// Notification errors are the only non-fatal kind: status reporting is
    /// fire-and-forget and must never take a running export down.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExportError::Notification(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_is_non_fatal() {
        assert!(!ExportError::Notification("status service down".into()).is_fatal());
    }

    #[test]
    fn test_pipeline_errors_are_fatal() {
        assert!(ExportError::Retrieval("backend unreachable".into()).is_fatal());
        assert!(ExportError::Staging("batch insert failed".into()).is_fatal());
        assert!(ExportError::Upload("put object failed".into()).is_fatal());
        assert!(ExportError::SchemaViolation {
            kind: "event".into(),
            expected: 6,
            actual: 5,
        }
        .is_fatal());
    }

    #[test]
    fn test_schema_violation_message() {
        let err = ExportError::SchemaViolation {
            kind: "agent".into(),
            expected: 4,
            actual: 7,
        };
        assert_eq!(
            err.to_string(),
            "Schema violation for kind 'agent': expected 4 columns, got 7"
        );
    }
}
