//! Database operations for the `posts` table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub post_id: String,
    pub urn: String,
    pub full_urn: Option<String>,
    pub platform: String,
    pub author_username: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub text_content: Option<String>,
    pub url: Option<String>,
    pub raw_payload: Value,
    /// Immutable; set once when the post is first observed.
    pub first_seen_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_marked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new `posts` row. `post_id` must be a freshly allocated
/// entity ID; `urn` is the identity key the table's unique constraint guards.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub post_id: String,
    pub urn: String,
    pub full_urn: Option<String>,
    pub platform: String,
    pub author_username: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub text_content: Option<String>,
    pub url: Option<String>,
    pub raw_payload: Value,
}

/// Result of [`insert_post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPostOutcome {
    /// The row was inserted; the post is new.
    Inserted,
    /// Another writer inserted the same `urn` first; the existing `post_id`
    /// is returned so the caller can re-resolve.
    ConcurrentDuplicate { existing_post_id: String },
}

// ---------------------------------------------------------------------------
// posts operations
// ---------------------------------------------------------------------------

/// Looks up a post by its identity key (`urn`).
///
/// Takes any Postgres executor so it works against a pool or inside a
/// record-level transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_post_by_urn(
    executor: impl sqlx::PgExecutor<'_>,
    urn: &str,
) -> Result<Option<PostRow>, DbError> {
    let row = sqlx::query_as::<_, PostRow>(
        "SELECT id, post_id, urn, full_urn, platform, author_username, posted_at, \
                text_content, url, raw_payload, first_seen_at, is_read, is_marked, \
                created_at, updated_at \
         FROM posts \
         WHERE urn = $1",
    )
    .bind(urn)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Inserts a new post row.
///
/// Uses `ON CONFLICT (urn) DO NOTHING` so that a concurrent insert of the
/// same identity key is reported as [`InsertPostOutcome::ConcurrentDuplicate`]
/// rather than an error. `first_seen_at` is set by the database default and
/// never updated afterwards.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, or [`DbError::NotFound`] if
/// the conflict path cannot re-resolve the existing row (it was deleted
/// between the insert and the lookup).
pub async fn insert_post(
    conn: &mut sqlx::PgConnection,
    post: &NewPost,
) -> Result<InsertPostOutcome, DbError> {
    let inserted: Option<String> = sqlx::query_scalar::<_, String>(
        "INSERT INTO posts \
             (post_id, urn, full_urn, platform, author_username, posted_at, \
              text_content, url, raw_payload) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::jsonb) \
         ON CONFLICT (urn) DO NOTHING \
         RETURNING post_id",
    )
    .bind(&post.post_id)
    .bind(&post.urn)
    .bind(&post.full_urn)
    .bind(&post.platform)
    .bind(&post.author_username)
    .bind(post.posted_at)
    .bind(&post.text_content)
    .bind(&post.url)
    .bind(&post.raw_payload)
    .fetch_optional(&mut *conn)
    .await?;

    if inserted.is_some() {
        return Ok(InsertPostOutcome::Inserted);
    }

    let existing = find_post_by_urn(&mut *conn, &post.urn)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(InsertPostOutcome::ConcurrentDuplicate {
        existing_post_id: existing.post_id,
    })
}

/// Sets the presentation-layer `is_read` flag.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no post has the given `post_id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_read(pool: &PgPool, post_id: &str, is_read: bool) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE posts SET is_read = $1, updated_at = NOW() WHERE post_id = $2")
        .bind(is_read)
        .bind(post_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Sets the presentation-layer `is_marked` flag.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no post has the given `post_id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_marked(pool: &PgPool, post_id: &str, is_marked: bool) -> Result<(), DbError> {
    let result =
        sqlx::query("UPDATE posts SET is_marked = $1, updated_at = NOW() WHERE post_id = $2")
            .bind(is_marked)
            .bind(post_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Total number of posts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_posts(pool: &PgPool) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Number of posts with `is_marked = TRUE`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_marked_posts(pool: &PgPool) -> Result<i64, DbError> {
    let count: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE is_marked = TRUE")
            .fetch_one(pool)
            .await?;

    Ok(count)
}
