//! Collex Export Worker
//!
//! Runs one parameterized export job per process invocation: filtered
//! retrieval from the search backend, fan-out into per-kind output rows,
//! optional Postgres staging for the relational mode, archive assembly and
//! upload, with job status reported to the tracking service.
//!
//! # Pipeline
//!
//! ```text
//! SearchCursor -> EntityFanOutMapper -> ArchiveWriter          (flat/packaged)
//!                                    -> StagingStore -> drain  (staged relational)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use collex_worker::job::JobRunner;
//! use collex_worker::remote::{
//!     FileTemplateRenderer, HttpMetadataProvider, HttpStatusReporter, S3PackageUploader,
//! };
//! use collex_worker::search::SearchClient;
//! use collex_worker::staging::MemoryStagingStore;
//! use collex_common::{ExportJob, OutputMode, SearchParam};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runner = JobRunner::new(
//!         SearchClient::new("http://search.local".into())?,
//!         Arc::new(MemoryStagingStore::new()),
//!         Arc::new(HttpStatusReporter::new("http://jobs.local".into())),
//!         Arc::new(HttpMetadataProvider::new("http://metadata.local".into())),
//!         Arc::new(FileTemplateRenderer::new("./templates/package-description.txt".into())?),
//!         Arc::new(S3PackageUploader::new("collex-exports".into(), None).await),
//!         300,
//!         "./work".into(),
//!     );
//!
//!     let job = ExportJob {
//!         job_id: uuid::Uuid::new_v4(),
//!         search_params: vec![SearchParam::equals("country", "Estonia")],
//!         target_kind: "specimen".into(),
//!         mode: OutputMode::PackagedArchive,
//!         source_system_id: None,
//!     };
//!     runner.run(&job).await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod job;
pub mod mapping;
pub mod remote;
pub mod search;
pub mod staging;
