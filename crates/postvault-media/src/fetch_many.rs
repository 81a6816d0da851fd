//! Parallel fetch over a bounded worker pool.

use futures::stream::{self, StreamExt};

use crate::cache::{CacheEntry, MediaCache};
use crate::error::MediaError;

impl MediaCache {
    /// Fetches a set of URLs concurrently, at most `max_concurrency` in
    /// flight at once.
    ///
    /// Every input URL yields exactly one output pair, success or failure,
    /// in input order; one URL's failure never cancels or blocks the rest.
    /// Workers share nothing but the cache directory, which is safe because
    /// writes are content-addressed.
    pub async fn fetch_many(
        &self,
        urls: Vec<String>,
        max_concurrency: usize,
    ) -> Vec<(String, Result<CacheEntry, MediaError>)> {
        let concurrency = max_concurrency.max(1);

        let mut results: Vec<(usize, String, Result<CacheEntry, MediaError>)> =
            stream::iter(urls.into_iter().enumerate().map(|(index, url)| async move {
                let result = self.fetch_and_cache(&url).await;
                (index, url, result)
            }))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        // Completion order is arbitrary; restore the input order.
        results.sort_by_key(|(index, ..)| *index);
        results
            .into_iter()
            .map(|(_, url, result)| (url, result))
            .collect()
    }

    /// [`Self::fetch_many`] with the cache's configured concurrency.
    pub async fn fetch_many_default(
        &self,
        urls: Vec<String>,
    ) -> Vec<(String, Result<CacheEntry, MediaError>)> {
        self.fetch_many(urls, self.max_concurrency()).await
    }
}
