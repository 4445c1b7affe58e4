//! Collex Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the Collex export worker.
//!
//! # Overview
//!
//! - **Error Handling**: the export error taxonomy and result alias
//! - **Logging**: tracing subscriber configuration
//! - **Types**: job description, entity kinds, output rows
//! - **Hash**: deterministic content-derived row identifiers
//!
//! # Example
//!
//! ```
//! use collex_common::hash::content_id;
//!
//! let id = content_id(&["Bufo bufo", "1998-07-14"]);
//! assert_eq!(id, content_id(&["Bufo bufo", "1998-07-14"]));
//! ```

pub mod error;
pub mod hash;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{ExportError, Result};
pub use types::{EntityKind, ExportJob, JobState, OutputMode, OutputRow, SearchParam};
