//! Collex Worker - single-shot export job runner

use anyhow::{anyhow, Result};
use clap::Parser;
use collex_common::logging::{init_logging, LogConfig, LogLevel};
use collex_common::{ExportJob, OutputMode, SearchParam};
use collex_worker::config::WorkerConfig;
use collex_worker::job::JobRunner;
use collex_worker::remote::{
    FileTemplateRenderer, HttpMetadataProvider, HttpStatusReporter, S3PackageUploader,
};
use collex_worker::search::SearchClient;
use collex_worker::staging::PgStagingStore;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "collex-worker")]
#[command(author, version, about = "Collex export job worker")]
struct Cli {
    /// Job identifier assigned by the scheduler
    #[arg(long)]
    job_id: Uuid,

    /// Search filter as `field=value`, or `field=` to require absence.
    /// Repeatable; filters are combined as a conjunction.
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<SearchParam>,

    /// Source record kind to export
    #[arg(long, default_value = "specimen")]
    target_kind: String,

    /// Output mode: flat, archive, or relational
    #[arg(long, default_value = "archive", value_parser = parse_mode)]
    mode: OutputMode,

    /// Upstream source system id; enables the metadata and description
    /// documents in the package
    #[arg(long)]
    source_system: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_filter(raw: &str) -> Result<SearchParam, String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Invalid filter '{}', expected field=value or field=", raw))?;
    if field.is_empty() {
        return Err(format!("Invalid filter '{}': empty field name", raw));
    }
    Ok(if value.is_empty() {
        SearchParam::absent(field)
    } else {
        SearchParam::equals(field, value)
    })
}

fn parse_mode(raw: &str) -> Result<OutputMode, String> {
    raw.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let mut log_config = LogConfig::from_env().unwrap_or_default();
    log_config.level = log_level;
    log_config.log_file_prefix = "collex-worker".to_string();
    init_logging(&log_config)?;

    let config = WorkerConfig::from_env()?;
    let job = ExportJob {
        job_id: cli.job_id,
        search_params: cli.filters,
        target_kind: cli.target_kind,
        mode: cli.mode,
        source_system_id: cli.source_system,
    };

    let runner = JobRunner::new(
        SearchClient::new(config.search_url.clone())?,
        Arc::new(PgStagingStore::connect(&config.database_url).await?),
        Arc::new(HttpStatusReporter::new(config.status_url.clone())),
        Arc::new(HttpMetadataProvider::new(config.metadata_url.clone())),
        Arc::new(FileTemplateRenderer::new(config.description_template.clone())?),
        Arc::new(S3PackageUploader::new(config.bucket.clone(), config.s3_endpoint.clone()).await),
        config.page_size,
        config.work_dir.clone(),
    );

    let outcome = runner
        .run(&job)
        .await
        .map_err(|e| anyhow!("export job failed: {}", e))?;

    info!(
        records = outcome.records,
        rows = outcome.rows,
        download_url = ?outcome.download_url,
        "Worker finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_equality() {
        let param = parse_filter("country=Estonia").unwrap();
        assert_eq!(param, SearchParam::equals("country", "Estonia"));
    }

    #[test]
    fn test_parse_filter_absence() {
        let param = parse_filter("media_url=").unwrap();
        assert_eq!(param, SearchParam::absent("media_url"));
    }

    #[test]
    fn test_parse_filter_rejects_bare_field() {
        assert!(parse_filter("country").is_err());
        assert!(parse_filter("=value").is_err());
    }

    #[test]
    fn test_cli_parses_full_invocation() {
        let cli = Cli::parse_from([
            "collex-worker",
            "--job-id",
            "3f2a8c1e-9d4b-4f6a-8e2d-1a5c7b9e0f3d",
            "--filter",
            "country=Estonia",
            "--filter",
            "media_url=",
            "--mode",
            "relational",
            "--source-system",
            "srcsys-7",
        ]);
        assert_eq!(cli.filters.len(), 2);
        assert_eq!(cli.mode, OutputMode::StagedRelational);
        assert_eq!(cli.source_system.as_deref(), Some("srcsys-7"));
        assert_eq!(cli.target_kind, "specimen");
    }
}
