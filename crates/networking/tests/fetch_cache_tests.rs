use std::sync::Arc;
use std::time::Duration;

use folio_networking::{CacheConfig, Fetcher, MemoryFetcher, TtlCache};
use pretty_assertions::assert_eq;
use serde_json::Value;

/// Fetch through the cache the way site services do
async fn cached_json(
    fetcher: &dyn Fetcher,
    cache: &TtlCache<String, Value>,
    path: &str,
) -> Option<Value> {
    let key = format!("api-{}", path);
    if let Some(hit) = cache.get(&key) {
        return Some(hit);
    }
    let response = fetcher.get(path).await.ok()?.error_for_status().ok()?;
    let value: Value = response.json().ok()?;
    cache.put(key, value.clone());
    Some(value)
}

#[tokio::test(start_paused = true)]
async fn test_cache_avoids_refetch_within_ttl() {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert("data/stats.json", r#"{"stats":[{"number":"12","label":"Repos"}]}"#);
    let cache = TtlCache::new(CacheConfig::default());

    let first = cached_json(fetcher.as_ref(), &cache, "data/stats.json").await;
    tokio::time::advance(Duration::from_secs(120)).await;
    let second = cached_json(fetcher.as_ref(), &cache, "data/stats.json").await;

    assert_eq!(first, second);
    assert_eq!(fetcher.request_count(), 1);

    tokio::time::advance(Duration::from_secs(181)).await;
    cached_json(fetcher.as_ref(), &cache, "data/stats.json").await;
    assert_eq!(fetcher.request_count(), 2);
}

#[tokio::test]
async fn test_error_status_is_not_cached() {
    let fetcher = MemoryFetcher::new();
    fetcher.insert_with_status("data/broken.json", 500, "{}");
    let cache = TtlCache::default();

    assert!(cached_json(&fetcher, &cache, "data/broken.json").await.is_none());
    assert!(cached_json(&fetcher, &cache, "data/broken.json").await.is_none());
    assert!(cache.is_empty());
    assert_eq!(fetcher.request_count(), 2);
}
