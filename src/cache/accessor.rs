//! Read-through cache accessor.
//!
//! Reads check the store first and fall back to the system of record on a
//! miss, repopulating the entry with a per-resource TTL. Store faults on this
//! path fail open: the loader runs and the response degrades to an uncached
//! read. A "not found" result from the loader is never cached, so repeated
//! lookups of a nonexistent id always reach the system of record.
//!
//! No single-flight guard is provided: concurrent misses for the same key
//! each run the loader and race to repopulate (last write wins).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::keys::CacheKey;
use super::store::KeyValueStore;

const TARGET: &str = "portico::cache";

/// Whether a read was served from the cache or the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Hit,
    Miss,
}

impl Lookup {
    pub fn from_cache(&self) -> bool {
        matches!(self, Lookup::Hit)
    }
}

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn KeyValueStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Read-through for values that always exist (collections, aggregates).
    pub async fn read_through<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        loader: F,
    ) -> Result<(T, Lookup), E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (value, lookup) = self
            .read_through_opt(key, ttl, || async move { loader().await.map(Some) })
            .await?;
        match value {
            Some(value) => Ok((value, lookup)),
            // Unreachable: the loader above always yields Some.
            None => unreachable!("read_through loader returned a value"),
        }
    }

    /// Read-through for point lookups. `Ok(None)` from the loader is passed
    /// through without being stored (no negative caching).
    pub async fn read_through_opt<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        loader: F,
    ) -> Result<(Option<T>, Lookup), E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let rendered = key.to_string();

        if let Some(value) = self.fetch::<T>(&rendered).await {
            counter!("portico_cache_hit_total").increment(1);
            return Ok((Some(value), Lookup::Hit));
        }
        counter!("portico_cache_miss_total").increment(1);

        let loaded = loader().await?;
        if let Some(value) = &loaded {
            self.fill(&rendered, value, ttl).await;
        }
        Ok((loaded, Lookup::Miss))
    }

    /// Non-populating probe. Used where one endpoint consults several keys
    /// before falling back to the system of record (session before profile).
    pub async fn peek<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        self.fetch(&key.to_string()).await
    }

    /// Store a value directly (session priming, write-behind fills).
    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        self.fill(&key.to_string(), value, ttl).await;
    }

    /// Drop entries outside the mutation table (logout, reset requests).
    /// Fail-open like every cache-side delete: absent keys are no-ops and
    /// store faults are logged, leaving TTL expiry as the safety net.
    pub async fn evict(&self, keys: &[CacheKey]) {
        let rendered: Vec<String> = keys.iter().map(CacheKey::to_string).collect();
        if let Err(error) = self.store.del(&rendered).await {
            warn!(target: TARGET, error = %error, "cache eviction failed");
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(target: TARGET, key, error = %error, "cache read failed, falling back to source");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                // A malformed entry is treated as a miss and overwritten by
                // the subsequent fill.
                warn!(target: TARGET, key, error = %error, "cache entry did not deserialize");
                None
            }
        }
    }

    async fn fill<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(error) => {
                warn!(target: TARGET, key, error = %error, "cache serialization failed");
                return;
            }
        };

        if let Err(error) = self.store.set_ex(key, &serialized, ttl).await {
            warn!(target: TARGET, key, error = %error, "cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;
    use uuid::Uuid;

    use super::super::store::MemoryStore;
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        id: u64,
        name: String,
    }

    fn cache() -> Cache {
        Cache::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn miss_loads_stores_then_hits() {
        let cache = cache();
        let key = CacheKey::User(Uuid::nil());
        let calls = AtomicUsize::new(0);

        let loader = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::convert::Infallible>(Payload {
                id: 123,
                name: "A".to_string(),
            })
        };

        let (first, lookup) = cache
            .read_through(&key, Duration::from_secs(3600), loader)
            .await
            .unwrap();
        assert_eq!(lookup, Lookup::Miss);
        assert_eq!(first.id, 123);

        let (second, lookup) = cache
            .read_through(&key, Duration::from_secs(3600), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::convert::Infallible>(Payload {
                    id: 999,
                    name: "should not load".to_string(),
                })
            })
            .await
            .unwrap();
        assert_eq!(lookup, Lookup::Hit);
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_is_never_cached() {
        let cache = cache();
        let key = CacheKey::User(Uuid::nil());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let (value, lookup) = cache
                .read_through_opt::<Payload, std::convert::Infallible, _, _>(
                    &key,
                    Duration::from_secs(3600),
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(None)
                    },
                )
                .await
                .unwrap();
            assert!(value.is_none());
            assert_eq!(lookup, Lookup::Miss);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn loader_errors_propagate() {
        let cache = cache();
        let key = CacheKey::UsersAll;

        let result = cache
            .read_through::<Payload, _, _, _>(&key, Duration::from_secs(60), || async {
                Err("database down")
            })
            .await;
        assert_eq!(result.unwrap_err(), "database down");

        // Nothing was stored on the failed load.
        assert!(cache.peek::<Payload>(&key).await.is_none());
    }

    #[tokio::test]
    async fn put_then_peek_roundtrip() {
        let cache = cache();
        let key = CacheKey::UserSession(Uuid::nil());
        let payload = Payload {
            id: 7,
            name: "session".to_string(),
        };

        cache.put(&key, &payload, Duration::from_secs(7200)).await;
        let cached: Payload = cache.peek(&key).await.unwrap();
        assert_eq!(cached, payload);
    }

    #[tokio::test]
    async fn malformed_entry_degrades_to_miss() {
        let store = Arc::new(MemoryStore::new());
        let cache = Cache::new(store.clone());
        let key = CacheKey::UsersAll;

        store
            .set_ex(&key.to_string(), "{not json", Duration::from_secs(60))
            .await
            .unwrap();

        let (value, lookup) = cache
            .read_through(&key, Duration::from_secs(60), || async {
                Ok::<_, std::convert::Infallible>(Payload {
                    id: 1,
                    name: "reloaded".to_string(),
                })
            })
            .await
            .unwrap();
        assert_eq!(lookup, Lookup::Miss);
        assert_eq!(value.name, "reloaded");

        // The bad entry was overwritten with the fresh serialization.
        let cached: Payload = cache.peek(&key).await.unwrap();
        assert_eq!(cached.name, "reloaded");
    }
}
