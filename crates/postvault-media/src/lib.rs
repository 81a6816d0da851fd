//! Content-addressed media cache.
//!
//! Downloads remote media, hashes the bytes (SHA-256), classifies the kind,
//! and stores each file once under `{root}/{kind_plural}/{hash}{ext}`.
//! Identical content fetched from different URLs lands on one file; cached
//! reads are integrity-checked against the expected hash and re-downloaded
//! once on corruption.

mod cache;
mod classify;
mod error;
mod fetch_many;
mod hash;

pub use cache::{
    CacheEntry, CacheStats, KindStats, MediaCache, MediaCacheConfig, BROWSER_USER_AGENT,
};
pub use classify::{classify_kind, extension_from_url, mime_for_extension, MediaKind};
pub use error::MediaError;
pub use hash::{hash_bytes, hash_file};

/// Format a byte count as a human-readable string (e.g. "1.5 MB").
#[must_use]
pub fn format_size(size_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    #[allow(clippy::cast_precision_loss)]
    let mut size = size_bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}
