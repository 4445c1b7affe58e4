//! Job-scoped staging store
//!
//! The staged-relational output mode cannot hold all produced rows in
//! memory, and the media kind needs a second pass that reads back what the
//! first pass collected. Rows are therefore parked per job and per kind and
//! later drained into the archive in bounded pages. Staged data is pure
//! intermediate storage: it is dropped at job end whatever the outcome.
//!
//! Uniqueness is on `(kind, id)` within a job; duplicate inserts are
//! silently skipped (first write wins). Reads page in insertion order so
//! the drain is deterministic.

pub mod postgres;

use async_trait::async_trait;
use collex_common::{EntityKind, ExportError, OutputRow, Result};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

pub use postgres::PgStagingStore;

/// Transient per-job row storage
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Create the per-job table for a kind; idempotent
    async fn create_table(&self, job_id: Uuid, kind: EntityKind) -> Result<()>;

    /// Atomically insert a batch, skipping ids already present
    async fn insert(&self, job_id: Uuid, kind: EntityKind, batch: &[OutputRow]) -> Result<()>;

    /// Read one page in insertion order
    async fn read_page(
        &self,
        job_id: Uuid,
        kind: EntityKind,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<OutputRow>>;

    /// Drop every staging table of the job; idempotent
    async fn drop_tables(&self, job_id: Uuid) -> Result<()>;
}

#[derive(Default)]
struct MemTable {
    rows: Vec<OutputRow>,
    ids: HashSet<String>,
}

/// In-memory staging store
///
/// Mirrors the Postgres contract for tests and for jobs small enough not to
/// warrant a database round-trip.
#[derive(Default)]
pub struct MemoryStagingStore {
    tables: Mutex<HashMap<(Uuid, EntityKind), MemTable>>,
}

impl MemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StagingStore for MemoryStagingStore {
    async fn create_table(&self, job_id: Uuid, kind: EntityKind) -> Result<()> {
        self.tables
            .lock()
            .await
            .entry((job_id, kind))
            .or_default();
        Ok(())
    }

    async fn insert(&self, job_id: Uuid, kind: EntityKind, batch: &[OutputRow]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let table = tables.get_mut(&(job_id, kind)).ok_or_else(|| {
            ExportError::Staging(format!("no staging table for job {} kind {}", job_id, kind))
        })?;

        for row in batch {
            if table.ids.insert(row.id.clone()) {
                table.rows.push(row.clone());
            }
        }
        Ok(())
    }

    async fn read_page(
        &self,
        job_id: Uuid,
        kind: EntityKind,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<OutputRow>> {
        let tables = self.tables.lock().await;
        let Some(table) = tables.get(&(job_id, kind)) else {
            return Ok(Vec::new());
        };
        Ok(table
            .rows
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn drop_tables(&self, job_id: Uuid) -> Result<()> {
        self.tables
            .lock()
            .await
            .retain(|(job, _), _| *job != job_id);
        Ok(())
    }
}
