//! Ingestion and deduplication engine.
//!
//! Takes batches of raw post payloads, resolves each to a stable `post_id`
//! by its platform URN (creating the post on first sight), and appends one
//! engagement snapshot per observation. Media references are fetched through
//! the content-addressed cache best-effort. A single bad record never aborts
//! a batch; the store's unique constraint on the identity key is the final
//! arbiter when two writers race.

mod engine;
mod error;
mod identity;
mod import;
mod payload;
mod source;

pub use engine::{ingest_batch, BatchStats, RecordError, MAX_ID_ATTEMPTS};
pub use error::IngestError;
pub use identity::{extract_identity, IdentityStrategy, STRATEGY_ORDER};
pub use import::{fail_run_best_effort, import_directory, ImportOutcome};
pub use payload::{coerce_count, extract_media_urls, extract_posted_at};
pub use source::{load_directory, FileError, LoadedBatch, RawRecord};
