//! Store-side uniqueness checks for entity ID allocation.

use sqlx::PgPool;

use crate::DbError;

/// The table an entity ID must be unique within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdNamespace {
    Post,
    Snapshot,
    Run,
    Asset,
}

/// Returns `true` if the given entity ID is already taken in its namespace.
///
/// The ID allocator calls this before insert and regenerates on collision.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn entity_id_exists(
    pool: &PgPool,
    namespace: IdNamespace,
    id: &str,
) -> Result<bool, DbError> {
    let query = match namespace {
        IdNamespace::Post => "SELECT EXISTS (SELECT 1 FROM posts WHERE post_id = $1)",
        IdNamespace::Snapshot => {
            "SELECT EXISTS (SELECT 1 FROM engagement_snapshots WHERE snapshot_id = $1)"
        }
        IdNamespace::Run => "SELECT EXISTS (SELECT 1 FROM ingestion_runs WHERE run_id = $1)",
        IdNamespace::Asset => "SELECT EXISTS (SELECT 1 FROM media_assets WHERE asset_id = $1)",
    };

    let exists: bool = sqlx::query_scalar::<_, bool>(query)
        .bind(id)
        .fetch_one(pool)
        .await?;

    Ok(exists)
}
