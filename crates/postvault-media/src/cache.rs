//! The content-addressed cache store: download, hash, classify, persist.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use reqwest::Client;

use crate::classify::{classify_kind, extension_from_url, mime_for_extension, MediaKind};
use crate::error::MediaError;
use crate::hash::{hash_bytes, hash_file};

/// Browser-like User-Agent used for downloads. Several source CDNs reject
/// requests carrying a default or blank client identifier.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Configuration for a [`MediaCache`].
#[derive(Debug, Clone)]
pub struct MediaCacheConfig {
    /// Per-download timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Default concurrency for [`MediaCache::fetch_many`].
    pub max_concurrency: usize,
}

impl Default for MediaCacheConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: BROWSER_USER_AGENT.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Metadata for one cached media file.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub source_url: String,
    /// Lowercase hex SHA-256 of the file bytes.
    pub content_hash: String,
    pub local_path: PathBuf,
    pub byte_size: u64,
    pub mime_type: Option<String>,
    pub kind: MediaKind,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Per-kind cache statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindStats {
    pub files: u64,
    pub bytes: u64,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_files: u64,
    pub total_bytes: u64,
    pub by_kind: Vec<(MediaKind, KindStats)>,
}

/// Content-addressed media cache rooted at a directory it owns exclusively.
///
/// Safe for concurrent use: all writers are content-addressed, so two
/// workers storing the same hash produce identical bytes, and each write
/// goes through a unique temp file renamed into place.
pub struct MediaCache {
    root: PathBuf,
    client: Client,
    max_concurrency: usize,
}

impl MediaCache {
    /// Creates the cache, its kind subdirectories, and the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Storage`] if a cache directory cannot be
    /// created, or [`MediaError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(root: impl Into<PathBuf>, config: &MediaCacheConfig) -> Result<Self, MediaError> {
        let root = root.into();

        for kind in MediaKind::ALL {
            let dir = root.join(kind.dir_name());
            std::fs::create_dir_all(&dir).map_err(|source| MediaError::Storage {
                path: dir.clone(),
                source,
            })?;
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            root,
            client,
            max_concurrency: config.max_concurrency.max(1),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    fn entry_path(&self, kind: MediaKind, hash: &str, ext: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(format!("{hash}{ext}"))
    }

    /// Downloads `url`, stores the bytes under their content address, and
    /// returns the cache entry.
    ///
    /// The hash is computed over the downloaded bytes, never the URL. If the
    /// destination file already exists with matching content the write is
    /// skipped; if it exists but re-hashes differently (corruption) it is
    /// replaced with the fresh bytes.
    ///
    /// # Errors
    ///
    /// - [`MediaError::Download`] — network failure or timeout.
    /// - [`MediaError::UnexpectedStatus`] — non-2xx response.
    /// - [`MediaError::Storage`] — disk I/O failure.
    pub async fn fetch_and_cache(&self, url: &str) -> Result<CacheEntry, MediaError> {
        tracing::debug!(%url, "downloading media");

        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| MediaError::Download {
                    url: url.to_string(),
                    source,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let bytes = response
            .bytes()
            .await
            .map_err(|source| MediaError::Download {
                url: url.to_string(),
                source,
            })?;

        let content_hash = hash_bytes(&bytes);
        let kind = classify_kind(url, mime_type.as_deref());
        let ext = extension_from_url(url);
        let dest = self.entry_path(kind, &content_hash, ext);

        let mut write_needed = true;
        if file_exists(&dest).await {
            match hash_file(&dest).await {
                Ok(existing) if existing == content_hash => {
                    tracing::debug!(path = %dest.display(), "cache hit, content identical");
                    write_needed = false;
                }
                Ok(_) | Err(_) => {
                    tracing::warn!(path = %dest.display(), "cached file corrupt, replacing");
                }
            }
        }

        if write_needed {
            write_atomic(&dest, &bytes).await?;
            tracing::info!(
                %url,
                path = %dest.display(),
                bytes = bytes.len(),
                "cached media"
            );
        }

        let (width, height) = match kind {
            MediaKind::Image => image_dimensions_of(&dest),
            MediaKind::Video | MediaKind::Document => (None, None),
        };

        Ok(CacheEntry {
            source_url: url.to_string(),
            content_hash,
            local_path: dest,
            byte_size: bytes.len() as u64,
            mime_type,
            kind,
            width,
            height,
        })
    }

    /// Finds a cached file by content hash, searching every kind directory.
    pub async fn find_cached(&self, hash: &str) -> Option<PathBuf> {
        for kind in MediaKind::ALL {
            let dir = self.root.join(kind.dir_name());
            let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if name.starts_with(hash) && !name.contains(".part-") {
                    return Some(entry.path());
                }
            }
        }
        None
    }

    /// Returns a verified cache entry for `expected_hash`, downloading from
    /// `url` only when necessary.
    ///
    /// A cached file whose recomputed hash matches is returned without any
    /// network round trip. On mismatch the corrupt file is deleted and the
    /// URL re-downloaded exactly once; if the fresh content still does not
    /// hash to `expected_hash`, the entry is reported corrupt.
    ///
    /// # Errors
    ///
    /// - [`MediaError::Corrupt`] — the re-downloaded bytes do not match
    ///   `expected_hash`.
    /// - Any error from [`Self::fetch_and_cache`].
    pub async fn ensure_cached(
        &self,
        url: &str,
        expected_hash: &str,
    ) -> Result<CacheEntry, MediaError> {
        if let Some(path) = self.find_cached(expected_hash).await {
            let actual = hash_file(&path)
                .await
                .map_err(|source| MediaError::Storage {
                    path: path.clone(),
                    source,
                })?;

            if actual == expected_hash {
                return self.entry_from_disk(url, &path, expected_hash).await;
            }

            tracing::warn!(
                path = %path.display(),
                expected = expected_hash,
                actual = %actual,
                "cached file failed integrity check, re-downloading"
            );
            tokio::fs::remove_file(&path)
                .await
                .map_err(|source| MediaError::Storage {
                    path: path.clone(),
                    source,
                })?;
        }

        let entry = self.fetch_and_cache(url).await?;
        if entry.content_hash != expected_hash {
            return Err(MediaError::Corrupt {
                url: url.to_string(),
                expected: expected_hash.to_string(),
                actual: entry.content_hash,
            });
        }

        Ok(entry)
    }

    /// Rebuilds a [`CacheEntry`] from a verified file already on disk.
    async fn entry_from_disk(
        &self,
        url: &str,
        path: &Path,
        hash: &str,
    ) -> Result<CacheEntry, MediaError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| MediaError::Storage {
                path: path.to_path_buf(),
                source,
            })?;

        let kind = kind_from_path(path).unwrap_or(MediaKind::Document);
        let ext = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.get(hash.len()..))
            .unwrap_or("");

        let (width, height) = match kind {
            MediaKind::Image => image_dimensions_of(path),
            MediaKind::Video | MediaKind::Document => (None, None),
        };

        Ok(CacheEntry {
            source_url: url.to_string(),
            content_hash: hash.to_string(),
            local_path: path.to_path_buf(),
            byte_size: metadata.len(),
            mime_type: mime_for_extension(ext).map(str::to_string),
            kind,
            width,
            height,
        })
    }

    /// Per-kind file counts and byte totals.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Storage`] if a kind directory cannot be read.
    pub async fn cache_stats(&self) -> Result<CacheStats, MediaError> {
        let mut stats = CacheStats::default();

        for kind in MediaKind::ALL {
            let dir = self.root.join(kind.dir_name());
            let mut kind_stats = KindStats::default();

            let mut entries =
                tokio::fs::read_dir(&dir)
                    .await
                    .map_err(|source| MediaError::Storage {
                        path: dir.clone(),
                        source,
                    })?;
            while let Ok(Some(entry)) = entries.next_entry().await {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if name.contains(".part-") {
                    continue;
                }
                if let Ok(metadata) = entry.metadata().await {
                    if metadata.is_file() {
                        kind_stats.files += 1;
                        kind_stats.bytes += metadata.len();
                    }
                }
            }

            stats.total_files += kind_stats.files;
            stats.total_bytes += kind_stats.bytes;
            stats.by_kind.push((kind, kind_stats));
        }

        Ok(stats)
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Write bytes through a uniquely named temp file renamed into place, so a
/// concurrent reader never observes a partially written entry.
async fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), MediaError> {
    let suffix: u32 = rand::rng().random();
    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("entry");
    let tmp = dest.with_file_name(format!("{file_name}.part-{suffix:08x}"));

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|source| MediaError::Storage {
            path: tmp.clone(),
            source,
        })?;

    tokio::fs::rename(&tmp, dest)
        .await
        .map_err(|source| MediaError::Storage {
            path: dest.to_path_buf(),
            source,
        })?;

    Ok(())
}

fn kind_from_path(path: &Path) -> Option<MediaKind> {
    let dir = path.parent()?.file_name()?.to_str()?;
    MediaKind::ALL.into_iter().find(|k| k.dir_name() == dir)
}

/// Pixel dimensions for image entries. Extraction failure is non-fatal; the
/// dimensions are simply left unset.
fn image_dimensions_of(path: &Path) -> (Option<u32>, Option<u32>) {
    match image::image_dimensions(path) {
        Ok((w, h)) => (Some(w), Some(h)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "could not read image dimensions");
            (None, None)
        }
    }
}
