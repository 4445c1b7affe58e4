//! Postgres-backed staging store
//!
//! One table per job and kind, named from the job's hex uuid and the kind's
//! fixed table name, so identifiers are SQL-safe by construction and no
//! placeholder binding is needed for the table name itself. A `bigserial`
//! sequence column gives the stable read-back order; `ON CONFLICT DO
//! NOTHING` on the id column gives first-write-wins batch semantics, and
//! each batch runs inside a single transaction so a crash cannot leave a
//! partially staged page.

use async_trait::async_trait;
use collex_common::{EntityKind, ExportError, OutputRow, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use super::StagingStore;

/// Staging store on a Postgres connection pool
pub struct PgStagingStore {
    pool: PgPool,
}

impl PgStagingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small pool; the worker is the only writer
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .map_err(staging_err)?;
        Ok(Self::new(pool))
    }
}

/// Table name for a job/kind pair, e.g. `staging_3f2a..._event`
fn table_name(job_id: Uuid, kind: EntityKind) -> String {
    format!("staging_{}_{}", job_id.simple(), kind.table_name())
}

fn staging_err(e: sqlx::Error) -> ExportError {
    ExportError::Staging(e.to_string())
}

#[async_trait]
impl StagingStore for PgStagingStore {
    async fn create_table(&self, job_id: Uuid, kind: EntityKind) -> Result<()> {
        let table = table_name(job_id, kind);
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                seq BIGSERIAL PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                payload JSONB NOT NULL
            )",
            table
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(staging_err)?;
        debug!(table = %table, "Ensured staging table");
        Ok(())
    }

    async fn insert(&self, job_id: Uuid, kind: EntityKind, batch: &[OutputRow]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let table = table_name(job_id, kind);
        let sql = format!(
            "INSERT INTO {} (id, payload) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
            table
        );

        let mut tx = self.pool.begin().await.map_err(staging_err)?;
        for row in batch {
            let payload = serde_json::to_value(row)?;
            sqlx::query(&sql)
                .bind(&row.id)
                .bind(payload)
                .execute(&mut *tx)
                .await
                .map_err(staging_err)?;
        }
        tx.commit().await.map_err(staging_err)?;

        debug!(table = %table, rows = batch.len(), "Staged batch");
        Ok(())
    }

    async fn read_page(
        &self,
        job_id: Uuid,
        kind: EntityKind,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<OutputRow>> {
        let table = table_name(job_id, kind);
        let sql = format!(
            "SELECT payload FROM {} ORDER BY seq LIMIT $1 OFFSET $2",
            table
        );

        let records = sqlx::query(&sql)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(staging_err)?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let payload: serde_json::Value = record.try_get("payload").map_err(staging_err)?;
            rows.push(serde_json::from_value(payload)?);
        }
        Ok(rows)
    }

    async fn drop_tables(&self, job_id: Uuid) -> Result<()> {
        for kind in EntityKind::ALL {
            let table = table_name(job_id, kind);
            let sql = format!("DROP TABLE IF EXISTS {}", table);
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(staging_err)?;
        }
        debug!(job_id = %job_id, "Dropped staging tables");
        Ok(())
    }
}
