//! Archive assembly
//!
//! Accumulates rows into one fixed-schema CSV per entity kind and finalizes
//! them into the job's deliverable: a bare CSV in flat mode, otherwise a
//! zip containing the tables, the schema descriptor and, for source-system
//! jobs, the upstream metadata document plus the rendered package
//! description.
//!
//! The first row written for a kind freezes that table's column list. A
//! later row with a different column count is a fatal schema violation: it
//! means the fan-out produced structurally inconsistent rows, and silently
//! skipping it would corrupt the table.

pub mod descriptor;

use collex_common::{EntityKind, ExportError, OutputMode, OutputRow, Result};
use descriptor::DescriptorTable;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Descriptor file name inside the package
pub const DESCRIPTOR_FILE: &str = "structure.xml";

/// Source-system metadata document file name inside the package
pub const METADATA_FILE: &str = "metadata.xml";

/// Rendered package description file name inside the package
pub const DESCRIPTION_FILE: &str = "package.txt";

/// Extra documents included in the package of a source-system job
#[derive(Debug, Default)]
pub struct PackageExtras {
    pub metadata_document: Option<String>,
    pub description: Option<String>,
}

struct TableState {
    writer: csv::Writer<File>,
    path: PathBuf,
    columns: Vec<String>,
    rows: u64,
}

/// Per-job archive writer
///
/// Owns the per-kind writer registry exclusively; one instance per job, no
/// shared state. `Open` until [`ArchiveWriter::finalize`]; any write after
/// that fails with [`ExportError::WriterClosed`].
pub struct ArchiveWriter {
    job_id: Uuid,
    mode: OutputMode,
    dir: PathBuf,
    tables: HashMap<EntityKind, TableState>,
    closed: bool,
}

impl ArchiveWriter {
    /// Create the job's work directory and an open writer
    pub fn create(work_dir: &Path, job_id: Uuid, mode: OutputMode) -> Result<Self> {
        let dir = work_dir.join(job_id.to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            job_id,
            mode,
            dir,
            tables: HashMap::new(),
            closed: false,
        })
    }

    /// Append rows to a kind's table
    ///
    /// Every row is validated against the frozen column count before it is
    /// written, so a schema violation never leaves a partial row behind.
    pub fn write(&mut self, kind: EntityKind, rows: &[OutputRow]) -> Result<()> {
        if self.closed {
            return Err(ExportError::WriterClosed);
        }

        for row in rows {
            self.ensure_table(kind, row)?;
            let table = self
                .tables
                .get_mut(&kind)
                .ok_or_else(|| ExportError::Archive("table registry out of sync".into()))?;

            if row.fields.len() != table.columns.len() {
                return Err(ExportError::SchemaViolation {
                    kind: kind.to_string(),
                    expected: table.columns.len(),
                    actual: row.fields.len(),
                });
            }

            table
                .writer
                .write_record(row.values())
                .map_err(|e| ExportError::Archive(e.to_string()))?;
            table.rows += 1;
        }
        Ok(())
    }

    /// Open a kind's table on first contact, freezing its column list from
    /// the first row's field names
    fn ensure_table(&mut self, kind: EntityKind, first_row: &OutputRow) -> Result<()> {
        if self.tables.contains_key(&kind) {
            return Ok(());
        }

        let path = self.dir.join(format!("{}.csv", kind.table_name()));
        let mut writer =
            csv::Writer::from_path(&path).map_err(|e| ExportError::Archive(e.to_string()))?;
        let columns: Vec<String> = first_row
            .fields
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        writer
            .write_record(&columns)
            .map_err(|e| ExportError::Archive(e.to_string()))?;
        debug!(kind = %kind, path = %path.display(), "Opened table");
        self.tables.insert(
            kind,
            TableState {
                writer,
                path,
                columns,
                rows: 0,
            },
        );
        Ok(())
    }

    /// Total rows accepted across all kinds
    pub fn total_rows(&self) -> u64 {
        self.tables.values().map(|t| t.rows).sum()
    }

    /// Close all tables and assemble the deliverable
    ///
    /// Returns the path of the finished package. The writer is closed
    /// afterwards regardless of outcome.
    pub fn finalize(&mut self, extras: PackageExtras) -> Result<PathBuf> {
        if self.closed {
            return Err(ExportError::WriterClosed);
        }
        self.closed = true;

        for table in self.tables.values_mut() {
            table.writer.flush()?;
        }

        match self.mode {
            OutputMode::Flat => self.finalize_flat(),
            OutputMode::PackagedArchive | OutputMode::StagedRelational => {
                self.finalize_packaged(extras)
            },
        }
    }

    fn finalize_flat(&self) -> Result<PathBuf> {
        let core = self.tables.get(&EntityKind::CORE).ok_or_else(|| {
            ExportError::Archive("flat export finalized without core rows".into())
        })?;
        info!(job_id = %self.job_id, rows = core.rows, "Finalized flat export");
        Ok(core.path.clone())
    }

    fn finalize_packaged(&self, extras: PackageExtras) -> Result<PathBuf> {
        // Drain order: core first, then extensions; empty kinds are simply
        // not present in the registry and thus omitted from the descriptor.
        let populated: Vec<&TableState> = EntityKind::ALL
            .iter()
            .filter_map(|kind| self.tables.get(kind))
            .collect();
        let described: Vec<DescriptorTable> = EntityKind::ALL
            .iter()
            .filter_map(|kind| {
                self.tables.get(kind).map(|table| DescriptorTable {
                    kind: *kind,
                    file: format!("{}.csv", kind.table_name()),
                    columns: table.columns.clone(),
                    rows: table.rows,
                })
            })
            .collect();

        let descriptor = descriptor::render_descriptor(&described)?;

        let package_path = self.dir.join(format!("{}.zip", self.job_id));
        let file = File::create(&package_path)?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default();

        for table in &populated {
            let name = table
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| ExportError::Archive("table file has no name".into()))?;
            zip.start_file(name, options)
                .map_err(|e| ExportError::Archive(e.to_string()))?;
            zip.write_all(&std::fs::read(&table.path)?)?;
        }

        zip.start_file(DESCRIPTOR_FILE, options)
            .map_err(|e| ExportError::Archive(e.to_string()))?;
        zip.write_all(descriptor.as_bytes())?;

        if let Some(metadata) = &extras.metadata_document {
            zip.start_file(METADATA_FILE, options)
                .map_err(|e| ExportError::Archive(e.to_string()))?;
            zip.write_all(metadata.as_bytes())?;
        }
        if let Some(description) = &extras.description {
            zip.start_file(DESCRIPTION_FILE, options)
                .map_err(|e| ExportError::Archive(e.to_string()))?;
            zip.write_all(description.as_bytes())?;
        }

        zip.finish()
            .map_err(|e| ExportError::Archive(e.to_string()))?;

        info!(
            job_id = %self.job_id,
            tables = populated.len(),
            rows = self.total_rows(),
            path = %package_path.display(),
            "Finalized package"
        );
        Ok(package_path)
    }
}
