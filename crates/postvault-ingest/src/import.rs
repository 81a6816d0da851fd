//! Directory import: one audited ingestion run around one batch.

use std::path::Path;

use sqlx::PgPool;

use postvault_core::ids::PREFIX_RUN;
use postvault_db::{
    complete_ingestion_run, create_ingestion_run, fail_ingestion_run, IdNamespace, RunCounters,
};
use postvault_media::MediaCache;

use crate::engine::{allocate_entity_id, ingest_batch, BatchStats};
use crate::error::IngestError;
use crate::source::load_directory;

/// Result of a completed directory import.
#[derive(Debug)]
pub struct ImportOutcome {
    pub run_id: String,
    pub stats: BatchStats,
}

/// Imports every JSON file under `dir` as one audited ingestion run.
///
/// The run record is created first in `running` status; the batch then runs
/// to completion and the run transitions to `completed` with the final
/// counters. Per-record and per-file failures are counted, not fatal — the
/// run only ends up `failed` when the batch cannot start at all (unreadable
/// directory, run bookkeeping failure).
///
/// # Errors
///
/// Returns [`IngestError::Source`] if the directory cannot be read, or an
/// allocation/database error if the run record cannot be created or closed.
pub async fn import_directory(
    pool: &PgPool,
    cache: Option<&MediaCache>,
    dir: &Path,
    platform: &str,
) -> Result<ImportOutcome, IngestError> {
    let batch = load_directory(dir)?;

    let run_id = allocate_entity_id(pool, IdNamespace::Run, PREFIX_RUN).await?;
    let source_host = std::env::var("HOSTNAME").ok();
    create_ingestion_run(pool, &run_id, source_host.as_deref()).await?;
    tracing::info!(
        run_id,
        directory = %dir.display(),
        records = batch.records.len(),
        file_errors = batch.file_errors.len(),
        "ingestion run started"
    );

    let mut stats = ingest_batch(pool, cache, &batch.records, Some(&run_id), platform).await;

    // Unloadable files count against the run like bad records do.
    for file_error in batch.file_errors {
        stats.errors += 1;
        stats.error_details.push(crate::engine::RecordError {
            identity: None,
            source: Some(file_error.path.display().to_string()),
            reason: file_error.reason,
        });
    }

    if let Err(e) = complete_ingestion_run(pool, &run_id, stats.run_counters()).await {
        fail_run_best_effort(pool, &run_id, &e.to_string(), stats.run_counters()).await;
        return Err(e.into());
    }
    tracing::info!(
        run_id,
        new = stats.new,
        duplicate = stats.duplicate,
        errors = stats.errors,
        "ingestion run completed"
    );

    Ok(ImportOutcome { run_id, stats })
}

/// Marks a run as failed, swallowing any secondary error. Used on the
/// cleanup path where the original failure is the one worth reporting.
pub async fn fail_run_best_effort(
    pool: &PgPool,
    run_id: &str,
    error_detail: &str,
    counters: RunCounters,
) {
    if let Err(e) = fail_ingestion_run(pool, run_id, error_detail, counters).await {
        tracing::error!(run_id, error = %e, "could not mark run as failed");
    }
}
