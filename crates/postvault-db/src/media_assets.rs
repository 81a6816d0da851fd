//! Database operations for the `media_assets` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `media_assets` table.
///
/// `content_hash`, `local_path`, and the size/dimension fields are `NULL`
/// until the asset has been fetched through the media cache.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaAssetRow {
    pub id: i64,
    pub asset_id: String,
    pub post_id: String,
    pub source_url: String,
    pub content_hash: Option<String>,
    pub local_path: Option<String>,
    pub byte_size: Option<i64>,
    pub mime_type: Option<String>,
    pub kind: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub analysis_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new or refreshed `media_assets` row.
#[derive(Debug, Clone)]
pub struct NewMediaAsset {
    pub asset_id: String,
    pub post_id: String,
    pub source_url: String,
    pub content_hash: Option<String>,
    pub local_path: Option<String>,
    pub byte_size: Option<i64>,
    pub mime_type: Option<String>,
    pub kind: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Upserts a media asset row.
///
/// Conflicts on `(post_id, source_url)` update the cache-derived fields in
/// place and keep the original `asset_id`, so re-ingesting a post refreshes
/// its assets without minting new identities.
///
/// Returns the `asset_id` of the upserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_media_asset(pool: &PgPool, asset: &NewMediaAsset) -> Result<String, DbError> {
    let asset_id: String = sqlx::query_scalar::<_, String>(
        "INSERT INTO media_assets \
             (asset_id, post_id, source_url, content_hash, local_path, byte_size, \
              mime_type, kind, width, height) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (post_id, source_url) DO UPDATE SET \
             content_hash = EXCLUDED.content_hash, \
             local_path   = EXCLUDED.local_path, \
             byte_size    = EXCLUDED.byte_size, \
             mime_type    = EXCLUDED.mime_type, \
             kind         = EXCLUDED.kind, \
             width        = EXCLUDED.width, \
             height       = EXCLUDED.height, \
             updated_at   = NOW() \
         RETURNING asset_id",
    )
    .bind(&asset.asset_id)
    .bind(&asset.post_id)
    .bind(&asset.source_url)
    .bind(&asset.content_hash)
    .bind(&asset.local_path)
    .bind(asset.byte_size)
    .bind(&asset.mime_type)
    .bind(&asset.kind)
    .bind(asset.width)
    .bind(asset.height)
    .fetch_one(pool)
    .await?;

    Ok(asset_id)
}

/// Returns all media assets referencing a post.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_assets_for_post(
    pool: &PgPool,
    post_id: &str,
) -> Result<Vec<MediaAssetRow>, DbError> {
    let rows = sqlx::query_as::<_, MediaAssetRow>(
        "SELECT id, asset_id, post_id, source_url, content_hash, local_path, byte_size, \
                mime_type, kind, width, height, analysis_status, created_at, updated_at \
         FROM media_assets \
         WHERE post_id = $1 \
         ORDER BY id ASC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns every asset reference sharing a content hash.
///
/// Multiple rows with one hash are the logical references to a single
/// deduplicated file on disk.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_assets_by_hash(
    pool: &PgPool,
    content_hash: &str,
) -> Result<Vec<MediaAssetRow>, DbError> {
    let rows = sqlx::query_as::<_, MediaAssetRow>(
        "SELECT id, asset_id, post_id, source_url, content_hash, local_path, byte_size, \
                mime_type, kind, width, height, analysis_status, created_at, updated_at \
         FROM media_assets \
         WHERE content_hash = $1 \
         ORDER BY id ASC",
    )
    .bind(content_hash)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Updates the `analysis_status` of an asset.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no asset has the given `asset_id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_analysis_status(
    pool: &PgPool,
    asset_id: &str,
    analysis_status: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE media_assets SET analysis_status = $1, updated_at = NOW() WHERE asset_id = $2",
    )
    .bind(analysis_status)
    .bind(asset_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
