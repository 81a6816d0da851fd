//! Integration tests for `MediaCache` using wiremock HTTP mocks and a
//! tempfile-backed cache root.

use postvault_media::{hash_bytes, MediaCache, MediaCacheConfig, MediaError, MediaKind};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0 not a real jpeg but stable bytes";

fn test_cache(root: &std::path::Path) -> MediaCache {
    let config = MediaCacheConfig {
        timeout_secs: 5,
        ..MediaCacheConfig::default()
    };
    MediaCache::new(root, &config).expect("cache construction should not fail")
}

async fn mount_media(server: &MockServer, route: &str, bytes: &[u8], content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", content_type)
                .set_body_bytes(bytes.to_vec()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetch_and_cache_stores_by_content_hash() {
    let server = MockServer::start().await;
    mount_media(&server, "/a/photo.jpg", JPEG_BYTES, "image/jpeg").await;

    let root = tempfile::tempdir().unwrap();
    let cache = test_cache(root.path());

    let url = format!("{}/a/photo.jpg", server.uri());
    let entry = cache.fetch_and_cache(&url).await.expect("fetch failed");

    assert_eq!(entry.content_hash, hash_bytes(JPEG_BYTES));
    assert_eq!(entry.kind, MediaKind::Image);
    assert_eq!(entry.byte_size, JPEG_BYTES.len() as u64);
    assert_eq!(entry.mime_type.as_deref(), Some("image/jpeg"));
    assert_eq!(
        entry.local_path,
        root.path()
            .join("images")
            .join(format!("{}.jpg", entry.content_hash))
    );
    assert_eq!(std::fs::read(&entry.local_path).unwrap(), JPEG_BYTES);
    // Not a decodable image, so dimension extraction fails non-fatally.
    assert!(entry.width.is_none());
    assert!(entry.height.is_none());
}

#[tokio::test]
async fn same_bytes_from_two_urls_share_one_file() {
    let server = MockServer::start().await;
    mount_media(&server, "/first/copy.jpg", JPEG_BYTES, "image/jpeg").await;
    mount_media(&server, "/second/copy.jpg", JPEG_BYTES, "image/jpeg").await;

    let root = tempfile::tempdir().unwrap();
    let cache = test_cache(root.path());

    let first = cache
        .fetch_and_cache(&format!("{}/first/copy.jpg", server.uri()))
        .await
        .unwrap();
    let second = cache
        .fetch_and_cache(&format!("{}/second/copy.jpg", server.uri()))
        .await
        .unwrap();

    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(first.local_path, second.local_path);

    let files: Vec<_> = std::fs::read_dir(root.path().join("images"))
        .unwrap()
        .collect();
    assert_eq!(files.len(), 1, "expected exactly one file on disk");
}

#[tokio::test]
async fn download_sends_realistic_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ua-check.jpg"))
        .and(header_exists("user-agent"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(JPEG_BYTES.to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let cache = test_cache(root.path());

    cache
        .fetch_and_cache(&format!("{}/ua-check.jpg", server.uri()))
        .await
        .expect("fetch failed");
}

#[tokio::test]
async fn non_2xx_status_is_a_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let cache = test_cache(root.path());

    let err = cache
        .fetch_and_cache(&format!("{}/gone.png", server.uri()))
        .await
        .expect_err("expected an error");
    assert!(
        matches!(err, MediaError::UnexpectedStatus { status: 404, .. }),
        "expected UnexpectedStatus(404), got: {err:?}"
    );
}

#[tokio::test]
async fn unrecognized_content_classifies_as_document() {
    let server = MockServer::start().await;
    mount_media(&server, "/blob", b"opaque bytes", "application/octet-stream").await;

    let root = tempfile::tempdir().unwrap();
    let cache = test_cache(root.path());

    let entry = cache
        .fetch_and_cache(&format!("{}/blob", server.uri()))
        .await
        .unwrap();

    assert_eq!(entry.kind, MediaKind::Document);
    assert!(entry.local_path.ends_with(format!(
        "documents/{}.bin",
        hash_bytes(b"opaque bytes")
    )));
}

#[tokio::test]
async fn ensure_cached_verified_hit_skips_the_network() {
    let server = MockServer::start().await;
    // Serve exactly once; the second access must come from disk.
    Mock::given(method("GET"))
        .and(path("/once.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(JPEG_BYTES.to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let cache = test_cache(root.path());

    let url = format!("{}/once.jpg", server.uri());
    let first = cache.fetch_and_cache(&url).await.unwrap();
    let second = cache
        .ensure_cached(&url, &first.content_hash)
        .await
        .expect("verified hit should not hit the network");

    assert_eq!(second.local_path, first.local_path);
    assert_eq!(second.byte_size, first.byte_size);
    assert_eq!(second.kind, MediaKind::Image);
    assert_eq!(second.mime_type.as_deref(), Some("image/jpeg"));
}

#[tokio::test]
async fn corrupted_file_triggers_exactly_one_redownload() {
    let server = MockServer::start().await;
    // Two hits total: the initial fetch and the corruption-triggered retry.
    Mock::given(method("GET"))
        .and(path("/asset.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(JPEG_BYTES.to_vec()),
        )
        .expect(2)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let cache = test_cache(root.path());

    let url = format!("{}/asset.jpg", server.uri());
    let entry = cache.fetch_and_cache(&url).await.unwrap();

    // Truncate the cached file to simulate silent corruption.
    std::fs::write(&entry.local_path, &JPEG_BYTES[..4]).unwrap();

    let restored = cache
        .ensure_cached(&url, &entry.content_hash)
        .await
        .expect("re-download should restore the entry");

    assert_eq!(restored.content_hash, entry.content_hash);
    assert_eq!(std::fs::read(&restored.local_path).unwrap(), JPEG_BYTES);
}

#[tokio::test]
async fn redownload_that_still_mismatches_reports_corrupt() {
    let server = MockServer::start().await;
    mount_media(&server, "/changed.jpg", b"replacement bytes", "image/jpeg").await;

    let root = tempfile::tempdir().unwrap();
    let cache = test_cache(root.path());

    let url = format!("{}/changed.jpg", server.uri());
    let expected = hash_bytes(b"the original bytes");

    let err = cache
        .ensure_cached(&url, &expected)
        .await
        .expect_err("expected a corruption error");
    assert!(
        matches!(err, MediaError::Corrupt { .. }),
        "expected Corrupt, got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_many_returns_one_result_per_input_in_order() {
    let server = MockServer::start().await;
    mount_media(&server, "/ok-1.jpg", b"first", "image/jpeg").await;
    mount_media(&server, "/ok-2.pdf", b"second", "application/pdf").await;
    Mock::given(method("GET"))
        .and(path("/broken.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let cache = test_cache(root.path());

    let urls = vec![
        format!("{}/ok-1.jpg", server.uri()),
        format!("{}/broken.jpg", server.uri()),
        format!("{}/ok-2.pdf", server.uri()),
    ];
    let results = cache.fetch_many(urls.clone(), 2).await;

    assert_eq!(results.len(), urls.len());
    for ((result_url, _), input_url) in results.iter().zip(&urls) {
        assert_eq!(result_url, input_url);
    }
    assert!(results[0].1.is_ok());
    assert!(
        matches!(
            results[1].1,
            Err(MediaError::UnexpectedStatus { status: 500, .. })
        ),
        "middle URL should fail without affecting the others"
    );
    assert!(results[2].1.is_ok());
}

#[tokio::test]
async fn cache_stats_counts_files_per_kind() {
    let server = MockServer::start().await;
    mount_media(&server, "/one.jpg", b"image bytes", "image/jpeg").await;
    mount_media(&server, "/two.pdf", b"document bytes", "application/pdf").await;

    let root = tempfile::tempdir().unwrap();
    let cache = test_cache(root.path());

    cache
        .fetch_and_cache(&format!("{}/one.jpg", server.uri()))
        .await
        .unwrap();
    cache
        .fetch_and_cache(&format!("{}/two.pdf", server.uri()))
        .await
        .unwrap();

    let stats = cache.cache_stats().await.unwrap();
    assert_eq!(stats.total_files, 2);
    assert_eq!(
        stats.total_bytes,
        (b"image bytes".len() + b"document bytes".len()) as u64
    );

    for (kind, kind_stats) in &stats.by_kind {
        match kind {
            MediaKind::Image | MediaKind::Document => assert_eq!(kind_stats.files, 1),
            MediaKind::Video => assert_eq!(kind_stats.files, 0),
        }
    }
}
