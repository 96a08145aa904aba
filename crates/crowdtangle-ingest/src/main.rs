//! Ingest entry point for processed CrowdTangle results.
//!
//! Reads batches of post records (one JSON array per line) from a file or
//! stdin and persists each through the deadlock-retrying database writer.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the environment and arguments
//! 2. Initialize structured logging (tracing, text or JSON)
//! 3. Connect to `PostgreSQL` (and migrate, if asked)
//! 4. Write every batch in the input
//! 5. Close the pool and log the totals

mod config;
mod error;
mod ingest;

use crowdtangle_db::{PgRecordStore, PostgresPool, RecordWriter};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::ingest::{IngestSummary, ingest};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, connection, or any batch fails. A
/// failed batch aborts the run so the surrounding pipeline can retry it.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = IngestConfig::load()?;

    // 2. Initialize structured logging.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!(
        max_attempts = config.retry.max_attempts(),
        run_migrations = config.run_migrations,
        input = config
            .input
            .as_ref()
            .map_or_else(|| String::from("<stdin>"), |p| p.display().to_string()),
        "crowdtangle-ingest starting"
    );

    // 3. Connect.
    let pool = PostgresPool::connect(&config.postgres).await?;
    if config.run_migrations {
        pool.run_migrations().await?;
    }

    // 4. Write.
    let writer = RecordWriter::with_retry_policy(PgRecordStore::from_pool(&pool), config.retry);
    let result = run(&config, &writer).await;

    // 5. Close and report.
    pool.close().await;
    let summary = result?;
    info!(
        batches = summary.batches,
        records = summary.records,
        "crowdtangle-ingest finished"
    );

    Ok(())
}

async fn run(
    config: &IngestConfig,
    writer: &RecordWriter<PgRecordStore>,
) -> Result<IngestSummary, IngestError> {
    match &config.input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            ingest(BufReader::new(file), writer).await
        }
        None => ingest(BufReader::new(tokio::io::stdin()), writer).await,
    }
}
