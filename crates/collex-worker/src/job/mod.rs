//! Job orchestration
//!
//! Drives one export job end to end: report running, pull pages from the
//! search cursor, fan each record out, route rows into the sink the output
//! mode calls for, resolve media in a second pass (staged mode), finalize,
//! upload, report the terminal state and clean staging up. Stages run
//! strictly in sequence; the mode is branched on only at the sink and the
//! finalize step.

use crate::archive::{ArchiveWriter, PackageExtras};
use crate::mapping::{catalog, EntityFanOutMapper, FanOut};
use crate::remote::{
    metadata::extract_title, MetadataProvider, PackageUploader, StatusReporter, TemplateRenderer,
};
use crate::search::{SearchClient, SearchCursor};
use crate::staging::StagingStore;
use chrono::Utc;
use collex_common::{EntityKind, ExportJob, JobState, OutputMode, OutputRow, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a finished job
#[derive(Debug)]
pub struct JobOutcome {
    /// Presigned download URL; `None` when the job produced no rows
    pub download_url: Option<String>,
    /// Records retrieved from the search backend
    pub records: u64,
    /// Rows accepted into the archive
    pub rows: u64,
}

/// One-job orchestrator
pub struct JobRunner {
    search: SearchClient,
    staging: Arc<dyn StagingStore>,
    status: Arc<dyn StatusReporter>,
    metadata: Arc<dyn MetadataProvider>,
    renderer: Arc<dyn TemplateRenderer>,
    uploader: Arc<dyn PackageUploader>,
    mapper: EntityFanOutMapper,
    page_size: usize,
    work_dir: PathBuf,
}

impl JobRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        search: SearchClient,
        staging: Arc<dyn StagingStore>,
        status: Arc<dyn StatusReporter>,
        metadata: Arc<dyn MetadataProvider>,
        renderer: Arc<dyn TemplateRenderer>,
        uploader: Arc<dyn PackageUploader>,
        page_size: usize,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            search,
            staging,
            status,
            metadata,
            renderer,
            uploader,
            mapper: EntityFanOutMapper::new(),
            page_size,
            work_dir,
        }
    }

    /// Run the job to a terminal state
    ///
    /// Returns the outcome on success and the fatal error on failure; in
    /// both cases the terminal state has been reported and staging has been
    /// cleaned up before this returns.
    pub async fn run(&self, job: &ExportJob) -> Result<JobOutcome> {
        info!(
            job_id = %job.job_id,
            mode = ?job.mode,
            target_kind = %job.target_kind,
            filters = job.search_params.len(),
            "Starting export job"
        );

        if let Err(e) = self.status.report_state(job.job_id, JobState::Running).await {
            warn!(job_id = %job.job_id, error = %e, "Could not report running state");
        }

        let result = self.execute(job).await;

        match &result {
            Ok(outcome) => {
                info!(
                    job_id = %job.job_id,
                    records = outcome.records,
                    rows = outcome.rows,
                    download_url = ?outcome.download_url,
                    "Export job succeeded"
                );
                if let Err(e) = self
                    .status
                    .report_complete(job.job_id, outcome.download_url.as_deref())
                    .await
                {
                    warn!(job_id = %job.job_id, error = %e, "Could not report completion");
                }
            },
            Err(err) => {
                error!(job_id = %job.job_id, error = %err, "Export job failed");
                if let Err(e) = self.status.report_state(job.job_id, JobState::Failed).await {
                    warn!(job_id = %job.job_id, error = %e, "Could not report failed state");
                }
            },
        }

        // Staged rows are intermediate data; they go whatever happened.
        if let Err(e) = self.staging.drop_tables(job.job_id).await {
            warn!(job_id = %job.job_id, error = %e, "Staging cleanup failed");
        }

        // The work directory too: the package has been uploaded (or the
        // job failed), so the CSV tables and the zip are spent.
        let job_dir = self.work_dir.join(job.job_id.to_string());
        if job_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&job_dir) {
                warn!(job_id = %job.job_id, error = %e, "Work directory cleanup failed");
            }
        }

        result
    }

    async fn execute(&self, job: &ExportJob) -> Result<JobOutcome> {
        let mut writer = ArchiveWriter::create(&self.work_dir, job.job_id, job.mode)?;
        let mut cursor = SearchCursor::new(
            &self.search,
            &job.target_kind,
            &job.search_params,
            self.page_size,
        );

        let mut records = 0u64;
        let mut staged_kinds: HashSet<EntityKind> = HashSet::new();

        while let Some(page) = cursor.next_page().await? {
            records += page.len() as u64;

            let mut page_rows: FanOut = BTreeMap::new();
            for record in &page {
                for (kind, rows) in self.mapper.map(record) {
                    page_rows.entry(kind).or_default().extend(rows);
                }
            }

            match job.mode {
                OutputMode::Flat => {
                    if let Some(rows) = page_rows.get(&EntityKind::CORE) {
                        writer.write(EntityKind::CORE, rows)?;
                    }
                },
                OutputMode::PackagedArchive => {
                    for (kind, rows) in &page_rows {
                        writer.write(*kind, rows)?;
                    }
                },
                OutputMode::StagedRelational => {
                    for (kind, rows) in &page_rows {
                        if staged_kinds.insert(*kind) {
                            self.staging.create_table(job.job_id, *kind).await?;
                        }
                        self.staging.insert(job.job_id, *kind, rows).await?;
                    }
                },
            }
        }

        if job.mode == OutputMode::StagedRelational {
            if staged_kinds.contains(&EntityKind::Relationship) {
                self.resolve_media(job, &mut staged_kinds).await?;
            }
            self.drain(job, &staged_kinds, &mut writer).await?;
        }

        let rows = writer.total_rows();
        if rows == 0 {
            // An empty result is not an error; there is just nothing to
            // package or upload. Records whose rows were all suppressed as
            // blank land here too.
            info!(job_id = %job.job_id, records, "No rows produced, skipping archive");
            return Ok(JobOutcome {
                download_url: None,
                records,
                rows: 0,
            });
        }

        let extras = self.package_extras(job, &writer).await?;
        let package = writer.finalize(extras)?;
        let download_url = self.uploader.upload(&package, job.job_id).await?;

        Ok(JobOutcome {
            download_url: Some(download_url),
            records,
            rows,
        })
    }

    /// Second retrieval pass for the media kind
    ///
    /// Re-reads the staged relationship rows in pages, collects `hasMedia`
    /// references, bulk-fetches the media records and stages one media row
    /// per reference. Paging over staging rather than an in-memory id set
    /// keeps memory bounded by the page size.
    async fn resolve_media(
        &self,
        job: &ExportJob,
        staged_kinds: &mut HashSet<EntityKind>,
    ) -> Result<()> {
        let mut offset = 0;
        let mut resolved = 0usize;

        loop {
            let page = self
                .staging
                .read_page(job.job_id, EntityKind::Relationship, offset, self.page_size)
                .await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();

            // (media id -> referencing core ids) for this page
            let mut references: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for row in &page {
                if field(row, "relationship_type") != Some(catalog::HAS_MEDIA) {
                    continue;
                }
                let (Some(media_id), Some(core_id)) =
                    (field(row, "related_id"), field(row, catalog::FOREIGN_KEY_COLUMN))
                else {
                    continue;
                };
                references
                    .entry(media_id.to_string())
                    .or_default()
                    .push(core_id.to_string());
            }
            if references.is_empty() {
                continue;
            }

            let ids: Vec<String> = references.keys().cloned().collect();
            let media_records = self.search.fetch_media_by_ids(&ids).await?;

            let mut media_rows: Vec<OutputRow> = Vec::new();
            for media in &media_records {
                let Some(core_ids) = references.get(&media.id) else {
                    continue;
                };
                for core_id in core_ids {
                    media_rows.extend(self.mapper.map_media(media, core_id));
                }
            }

            if !media_rows.is_empty() {
                if staged_kinds.insert(EntityKind::Media) {
                    self.staging.create_table(job.job_id, EntityKind::Media).await?;
                }
                resolved += media_rows.len();
                self.staging
                    .insert(job.job_id, EntityKind::Media, &media_rows)
                    .await?;
            }
        }

        info!(job_id = %job.job_id, rows = resolved, "Resolved media references");
        Ok(())
    }

    /// Drain staged rows kind by kind into the archive, in bounded pages
    async fn drain(
        &self,
        job: &ExportJob,
        staged_kinds: &HashSet<EntityKind>,
        writer: &mut ArchiveWriter,
    ) -> Result<()> {
        for kind in EntityKind::ALL {
            if !staged_kinds.contains(&kind) {
                continue;
            }
            let mut offset = 0;
            loop {
                let page = self
                    .staging
                    .read_page(job.job_id, kind, offset, self.page_size)
                    .await?;
                if page.is_empty() {
                    break;
                }
                offset += page.len();
                writer.write(kind, &page)?;
            }
        }
        Ok(())
    }

    /// Assemble the extra package documents for source-system jobs
    async fn package_extras(&self, job: &ExportJob, writer: &ArchiveWriter) -> Result<PackageExtras> {
        // A flat export is one bare CSV; it has nowhere to carry the
        // metadata document or the description.
        if job.mode == OutputMode::Flat {
            return Ok(PackageExtras::default());
        }
        let Some(source_system_id) = &job.source_system_id else {
            return Ok(PackageExtras::default());
        };

        let document = self.metadata.metadata_document(source_system_id).await?;
        let source_system =
            extract_title(&document).unwrap_or_else(|| source_system_id.clone());

        let model = BTreeMap::from([
            ("job_id".to_string(), job.job_id.to_string()),
            ("source_system".to_string(), source_system),
            ("generated".to_string(), Utc::now().to_rfc3339()),
            ("rows".to_string(), writer.total_rows().to_string()),
        ]);
        let description = self.renderer.render(&model)?;

        Ok(PackageExtras {
            metadata_document: Some(document),
            description: Some(description),
        })
    }
}

fn field<'a>(row: &'a OutputRow, name: &str) -> Option<&'a str> {
    row.fields
        .iter()
        .find(|(column, _)| column == name)
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.is_empty())
}
