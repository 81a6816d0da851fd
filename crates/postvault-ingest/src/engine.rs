//! Batch ingestion: dedup by identity key, append snapshots, link media.

use serde_json::Value;
use sqlx::PgPool;

use postvault_core::ids::{
    generate_entity_id, PREFIX_ASSET, PREFIX_POST, PREFIX_SNAPSHOT,
};
use postvault_db::{
    entity_id_exists, find_post_by_urn, insert_post, insert_snapshot, upsert_media_asset,
    DbError, IdNamespace, InsertPostOutcome, NewMediaAsset, NewPost, NewSnapshot,
};
use postvault_media::MediaCache;

use crate::error::IngestError;
use crate::identity::extract_identity;
use crate::payload::{
    coerce_count, extract_author_username, extract_media_urls, extract_posted_at,
    extract_raw_stats, string_field,
};
use crate::source::RawRecord;

/// How many random IDs the allocator tries before giving up.
pub const MAX_ID_ATTEMPTS: u32 = 5;

/// One record that could not be ingested, with enough context to triage.
#[derive(Debug, Clone)]
pub struct RecordError {
    /// Identity key, when one could be extracted before the failure.
    pub identity: Option<String>,
    /// Provenance of the record, typically the source file.
    pub source: Option<String>,
    pub reason: String,
}

/// Outcome of one batch: every record is accounted for in exactly one of
/// `new`, `duplicate`, or `errors`.
#[derive(Debug, Default)]
pub struct BatchStats {
    pub fetched: u32,
    pub new: u32,
    pub duplicate: u32,
    pub errors: u32,
    pub media_found: u32,
    pub media_cached: u32,
    pub media_errored: u32,
    pub error_details: Vec<RecordError>,
}

impl BatchStats {
    /// The subset of counters persisted on the owning ingestion run.
    #[must_use]
    pub fn run_counters(&self) -> postvault_db::RunCounters {
        postvault_db::RunCounters {
            fetched: saturating_i32(self.fetched),
            new: saturating_i32(self.new),
            duplicate: saturating_i32(self.duplicate),
            errors: saturating_i32(self.errors),
        }
    }

    fn record_error(&mut self, identity: Option<String>, source: Option<String>, reason: String) {
        self.errors += 1;
        self.error_details.push(RecordError {
            identity,
            source,
            reason,
        });
    }
}

fn saturating_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Ingests a batch of raw records.
///
/// Each record is processed independently: its post row and engagement
/// snapshot commit in one transaction, and a failure is counted and recorded
/// without touching the rest of the batch. When `cache` is given, media
/// referenced by new or duplicate posts is fetched and linked best-effort
/// after the record commits; media failures never fail the record.
///
/// This function itself never fails — every problem is a counter and an
/// entry in [`BatchStats::error_details`].
pub async fn ingest_batch(
    pool: &PgPool,
    cache: Option<&MediaCache>,
    records: &[RawRecord],
    run_id: Option<&str>,
    platform: &str,
) -> BatchStats {
    let mut stats = BatchStats {
        fetched: saturating_u32(records.len()),
        ..BatchStats::default()
    };

    for record in records {
        match ingest_record(pool, record, run_id, platform).await {
            Ok(outcome) => {
                match outcome.disposition {
                    Disposition::New => stats.new += 1,
                    Disposition::Duplicate => stats.duplicate += 1,
                }
                if let Some(cache) = cache {
                    link_media(pool, cache, &outcome.post_id, &record.value, &mut stats).await;
                }
            }
            Err(e) => {
                let identity = extract_identity(&record.value).map(|(key, _)| key.to_string());
                tracing::warn!(
                    identity = identity.as_deref().unwrap_or("<none>"),
                    source = record.source_reference.as_deref().unwrap_or("<none>"),
                    error = %e,
                    "record skipped"
                );
                stats.record_error(identity, record.source_reference.clone(), e.to_string());
            }
        }
    }

    tracing::info!(
        fetched = stats.fetched,
        new = stats.new,
        duplicate = stats.duplicate,
        errors = stats.errors,
        media_cached = stats.media_cached,
        "batch ingested"
    );

    stats
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    New,
    Duplicate,
}

impl Disposition {
    /// A conflict on the identity key means another writer created the post
    /// first; the record is a duplicate no matter what the lookup said.
    fn from_insert(outcome: &InsertPostOutcome) -> Self {
        match outcome {
            InsertPostOutcome::Inserted => Disposition::New,
            InsertPostOutcome::ConcurrentDuplicate { .. } => Disposition::Duplicate,
        }
    }
}

struct RecordOutcome {
    post_id: String,
    disposition: Disposition,
}

/// Ingests one record: resolve identity, create the post if unseen, and
/// append exactly one engagement snapshot. Post and snapshot share one
/// transaction, so a failed record leaves no partial rows.
async fn ingest_record(
    pool: &PgPool,
    record: &RawRecord,
    run_id: Option<&str>,
    platform: &str,
) -> Result<RecordOutcome, IngestError> {
    let (urn, _) = extract_identity(&record.value).ok_or(IngestError::MissingIdentity)?;

    let existing = find_post_by_urn(pool, urn).await?;

    let (post_id, disposition) = match existing {
        Some(post) => (post.post_id, Disposition::Duplicate),
        None => (
            allocate_entity_id(pool, IdNamespace::Post, PREFIX_POST).await?,
            Disposition::New,
        ),
    };
    let snapshot_id = allocate_entity_id(pool, IdNamespace::Snapshot, PREFIX_SNAPSHOT).await?;

    let mut tx = pool.begin().await.map_err(DbError::from)?;

    let (post_id, disposition) = if disposition == Disposition::New {
        let post = NewPost {
            post_id: post_id.clone(),
            urn: urn.to_string(),
            full_urn: string_field(&record.value, "full_urn"),
            platform: platform.to_string(),
            author_username: extract_author_username(&record.value),
            posted_at: extract_posted_at(&record.value),
            text_content: string_field(&record.value, "text"),
            url: string_field(&record.value, "url"),
            raw_payload: record.value.clone(),
        };
        let outcome = insert_post(&mut tx, &post).await?;
        let disposition = Disposition::from_insert(&outcome);
        match outcome {
            InsertPostOutcome::Inserted => (post_id, disposition),
            // Another writer won the race between our lookup and the insert;
            // the snapshot still attaches to the surviving post.
            InsertPostOutcome::ConcurrentDuplicate { existing_post_id } => {
                (existing_post_id, disposition)
            }
        }
    } else {
        (post_id, disposition)
    };

    let snapshot = NewSnapshot {
        snapshot_id,
        post_id: post_id.clone(),
        run_id: run_id.map(str::to_string),
        reaction_count: coerce_count(
            record
                .value
                .get("stats")
                .and_then(|s| s.get("total_reactions")),
        ),
        raw_stats: extract_raw_stats(&record.value),
        source_reference: record.source_reference.clone(),
    };
    insert_snapshot(&mut *tx, &snapshot).await?;

    tx.commit().await.map_err(DbError::from)?;

    Ok(RecordOutcome {
        post_id,
        disposition,
    })
}

/// Fetches a record's media references through the cache and upserts the
/// asset rows. Best-effort: failures bump `media_errored` and are logged.
async fn link_media(
    pool: &PgPool,
    cache: &MediaCache,
    post_id: &str,
    record: &Value,
    stats: &mut BatchStats,
) {
    let urls = extract_media_urls(record);
    if urls.is_empty() {
        return;
    }
    stats.media_found += saturating_u32(urls.len());

    for (url, result) in cache.fetch_many_default(urls).await {
        match result {
            Ok(entry) => {
                match store_asset(pool, post_id, &entry).await {
                    Ok(()) => stats.media_cached += 1,
                    Err(e) => {
                        tracing::warn!(url = %url, post_id, error = %e, "asset row not stored");
                        stats.media_errored += 1;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(url = %url, post_id, error = %e, "media fetch failed");
                stats.media_errored += 1;
            }
        }
    }
}

async fn store_asset(
    pool: &PgPool,
    post_id: &str,
    entry: &postvault_media::CacheEntry,
) -> Result<(), IngestError> {
    let asset_id = allocate_entity_id(pool, IdNamespace::Asset, PREFIX_ASSET).await?;
    let asset = NewMediaAsset {
        asset_id,
        post_id: post_id.to_string(),
        source_url: entry.source_url.clone(),
        content_hash: Some(entry.content_hash.clone()),
        local_path: Some(entry.local_path.display().to_string()),
        byte_size: i64::try_from(entry.byte_size).ok(),
        mime_type: entry.mime_type.clone(),
        kind: entry.kind.as_str().to_string(),
        width: entry.width.and_then(|w| i32::try_from(w).ok()),
        height: entry.height.and_then(|h| i32::try_from(h).ok()),
    };
    upsert_media_asset(pool, &asset).await?;
    Ok(())
}

/// Allocates a fresh entity ID, regenerating on collision with an existing
/// row. Gives up after [`MAX_ID_ATTEMPTS`] tries.
pub(crate) async fn allocate_entity_id(
    pool: &PgPool,
    namespace: IdNamespace,
    prefix: &'static str,
) -> Result<String, IngestError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = generate_entity_id(prefix);
        if !entity_id_exists(pool, namespace, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(IngestError::IdAllocation {
        prefix,
        attempts: MAX_ID_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_counters_saturate_instead_of_wrapping() {
        let stats = BatchStats {
            fetched: u32::MAX,
            new: 3,
            ..BatchStats::default()
        };
        let counters = stats.run_counters();
        assert_eq!(counters.fetched, i32::MAX);
        assert_eq!(counters.new, 3);
    }

    #[test]
    fn insert_conflict_resolves_to_duplicate() {
        let conflict = InsertPostOutcome::ConcurrentDuplicate {
            existing_post_id: "post-00000001".to_string(),
        };
        assert_eq!(Disposition::from_insert(&conflict), Disposition::Duplicate);
        assert_eq!(
            Disposition::from_insert(&InsertPostOutcome::Inserted),
            Disposition::New
        );
    }

    #[test]
    fn record_error_keeps_context() {
        let mut stats = BatchStats::default();
        stats.record_error(
            Some("urn:li:activity:1".into()),
            Some("batch.json".into()),
            "no usable identity key in record".into(),
        );
        assert_eq!(stats.errors, 1);
        assert_eq!(
            stats.error_details[0].identity.as_deref(),
            Some("urn:li:activity:1")
        );
    }
}
