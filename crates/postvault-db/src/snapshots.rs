//! Database operations for the `engagement_snapshots` table.
//!
//! Snapshots are append-only: this module exposes insert and read operations
//! only. The per-post engagement time series is the set of snapshots ordered
//! by `observed_at`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `engagement_snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EngagementSnapshotRow {
    pub id: i64,
    pub snapshot_id: String,
    pub post_id: String,
    /// Nullable foreign key to `ingestion_runs`; `NULL` for ad-hoc captures.
    pub run_id: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub reaction_count: i64,
    pub raw_stats: Value,
    pub source_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new snapshot row.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub snapshot_id: String,
    pub post_id: String,
    pub run_id: Option<String>,
    pub reaction_count: i64,
    pub raw_stats: Value,
    pub source_reference: Option<String>,
}

/// Inserts one engagement snapshot. `observed_at` is set by the database.
///
/// Takes any Postgres executor so the insert can share a transaction with
/// the owning post's insert.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a foreign-key
/// violation when `post_id` does not reference an existing post).
pub async fn insert_snapshot(
    executor: impl sqlx::PgExecutor<'_>,
    snapshot: &NewSnapshot,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO engagement_snapshots \
             (snapshot_id, post_id, run_id, reaction_count, raw_stats, source_reference) \
         VALUES ($1, $2, $3, $4, $5::jsonb, $6)",
    )
    .bind(&snapshot.snapshot_id)
    .bind(&snapshot.post_id)
    .bind(&snapshot.run_id)
    .bind(snapshot.reaction_count)
    .bind(&snapshot.raw_stats)
    .bind(&snapshot.source_reference)
    .execute(executor)
    .await?;

    Ok(())
}

/// Returns all snapshots for a post, oldest first.
///
/// Ordered by `observed_at ASC, id ASC` so snapshots sharing a timestamp
/// keep insertion order; this is the post's engagement time series.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_snapshots_for_post(
    pool: &PgPool,
    post_id: &str,
) -> Result<Vec<EngagementSnapshotRow>, DbError> {
    let rows = sqlx::query_as::<_, EngagementSnapshotRow>(
        "SELECT id, snapshot_id, post_id, run_id, observed_at, reaction_count, \
                raw_stats, source_reference, created_at \
         FROM engagement_snapshots \
         WHERE post_id = $1 \
         ORDER BY observed_at ASC, id ASC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Total number of snapshots.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_snapshots(pool: &PgPool) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM engagement_snapshots")
        .fetch_one(pool)
        .await?;

    Ok(count)
}
