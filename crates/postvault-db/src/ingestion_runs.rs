//! Database operations for the `ingestion_runs` table.
//!
//! A run is created in `running` status and transitions exactly once to
//! `completed` or `failed`; the `WHERE status = 'running'` guard on the
//! terminal updates makes a second transition a typed error.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `ingestion_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestionRunRow {
    pub id: i64,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub posts_fetched: i32,
    pub posts_new: i32,
    pub posts_duplicate: i32,
    pub posts_errored: i32,
    pub error_detail: Option<String>,
    pub source_host: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counters written when a run reaches a terminal state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunCounters {
    pub fetched: i32,
    pub new: i32,
    pub duplicate: i32,
    pub errors: i32,
}

/// Creates a new ingestion run in `running` status.
///
/// `run_id` is a pre-allocated entity ID; `started_at` is set by the
/// database. Returns the full newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_ingestion_run(
    pool: &PgPool,
    run_id: &str,
    source_host: Option<&str>,
) -> Result<IngestionRunRow, DbError> {
    let row = sqlx::query_as::<_, IngestionRunRow>(
        "INSERT INTO ingestion_runs (run_id, source_host) \
         VALUES ($1, $2) \
         RETURNING id, run_id, started_at, completed_at, status, \
                   posts_fetched, posts_new, posts_duplicate, posts_errored, \
                   error_detail, source_host, created_at",
    )
    .bind(run_id)
    .bind(source_host)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `completed`, sets `completed_at = NOW()` and the counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not in `running`
/// status, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_ingestion_run(
    pool: &PgPool,
    run_id: &str,
    counters: RunCounters,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'completed', completed_at = NOW(), \
             posts_fetched = $1, posts_new = $2, posts_duplicate = $3, posts_errored = $4 \
         WHERE run_id = $5 AND status = 'running'",
    )
    .bind(counters.fetched)
    .bind(counters.new)
    .bind(counters.duplicate)
    .bind(counters.errors)
    .bind(run_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            run_id: run_id.to_string(),
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, sets `completed_at = NOW()` and `error_detail`.
///
/// Counters reflect whatever progress was made before the failure.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not in `running`
/// status, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_ingestion_run(
    pool: &PgPool,
    run_id: &str,
    error_detail: &str,
    counters: RunCounters,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'failed', completed_at = NOW(), error_detail = $1, \
             posts_fetched = $2, posts_new = $3, posts_duplicate = $4, posts_errored = $5 \
         WHERE run_id = $6 AND status = 'running'",
    )
    .bind(error_detail)
    .bind(counters.fetched)
    .bind(counters.new)
    .bind(counters.duplicate)
    .bind(counters.errors)
    .bind(run_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            run_id: run_id.to_string(),
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its `run_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `run_id`,
/// or [`DbError::Sqlx`] if the query fails.
pub async fn get_ingestion_run(pool: &PgPool, run_id: &str) -> Result<IngestionRunRow, DbError> {
    let row = sqlx::query_as::<_, IngestionRunRow>(
        "SELECT id, run_id, started_at, completed_at, status, \
                posts_fetched, posts_new, posts_duplicate, posts_errored, \
                error_detail, source_host, created_at \
         FROM ingestion_runs \
         WHERE run_id = $1",
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingestion_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<IngestionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, IngestionRunRow>(
        "SELECT id, run_id, started_at, completed_at, status, \
                posts_fetched, posts_new, posts_duplicate, posts_errored, \
                error_detail, source_host, created_at \
         FROM ingestion_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Total number of ingestion runs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_ingestion_runs(pool: &PgPool) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ingestion_runs")
        .fetch_one(pool)
        .await?;

    Ok(count)
}
