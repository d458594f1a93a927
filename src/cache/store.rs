//! Key-value store seam.
//!
//! The cache layer talks to its backing store exclusively through
//! [`KeyValueStore`], so the production Redis client and the in-memory test
//! double are interchangeable. Operations mirror the small Redis subset the
//! layer needs: atomic increment, expiry, get/set-with-TTL, delete, exists,
//! TTL query, and pattern listing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
    #[error("key-value store protocol error: {0}")]
    Protocol(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Atomically increment the integer at `key`, creating it at 1.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set the expiry of `key`. Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Delete the given keys; absent keys are ignored. Returns the number
    /// actually removed.
    async fn del(&self, keys: &[String]) -> Result<u64, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Remaining time to live, `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// List keys matching a glob pattern (`*` wildcards only).
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
}

// ============================================================================
// In-memory store
// ============================================================================

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Process-local [`KeyValueStore`] with real TTL bookkeeping.
///
/// Backs the test suite. Production wiring uses the external Redis store
/// exclusively; a per-process store would break counters and invalidation
/// across multiple server instances.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn purge_expired(entries: &mut HashMap<String, MemoryEntry>, now: Instant) {
        entries.retain(|_, entry| !entry.is_expired(now));
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, now);

        let entry = entries.entry(key.to_string()).or_insert(MemoryEntry {
            value: "0".to_string(),
            expires_at: None,
        });
        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| StoreError::protocol(format!("non-integer value at `{key}`")))?;
        let next = current + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, now);

        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, now);
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        let mut entries = self.lock();
        let mut removed = 0;
        for key in keys {
            if entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, now);
        Ok(entries.contains_key(key))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, now);
        Ok(entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now)))
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, now);
        Ok(entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect())
    }
}

/// Match `text` against a pattern where `*` spans any run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == text;
    }

    let mut rest = text;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(stripped) => rest = stripped,
                None => return false,
            }
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }

    // Pattern ended with `*`: any remainder matches.
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incr_creates_and_counts() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("counter").await.unwrap(), 1);
        assert_eq!(store.incr("counter").await.unwrap(), 2);
        assert_eq!(store.incr("counter").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn expire_on_missing_key_is_false() {
        let store = MemoryStore::new();
        assert!(!store.expire("ghost", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn set_ex_roundtrip_and_ttl() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        let ttl = store.ttl("k").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn entries_expire() {
        let store = MemoryStore::new();
        store
            .set_ex("gone", "v", Duration::from_millis(5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(store.get("gone").await.unwrap(), None);
        assert!(!store.exists("gone").await.unwrap());
    }

    #[tokio::test]
    async fn del_ignores_missing_keys() {
        let store = MemoryStore::new();
        store
            .set_ex("present", "v", Duration::from_secs(60))
            .await
            .unwrap();
        let removed = store
            .del(&["present".to_string(), "absent".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        // Idempotent: deleting again removes nothing and does not error.
        let removed = store.del(&["present".to_string()]).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn scan_matches_globs() {
        let store = MemoryStore::new();
        for key in [
            "rate_limit:login:ip:1.2.3.4",
            "rate_limit:register:ip:1.2.3.4",
            "rate_limit:login:email:a@b.c",
            "user:123",
        ] {
            store.set_ex(key, "1", Duration::from_secs(60)).await.unwrap();
        }

        let mut hits = store.scan("rate_limit:*:ip:1.2.3.4").await.unwrap();
        hits.sort();
        assert_eq!(
            hits,
            vec![
                "rate_limit:login:ip:1.2.3.4".to_string(),
                "rate_limit:register:ip:1.2.3.4".to_string(),
            ]
        );

        let hits = store.scan("rate_limit:*:email:a@b.c").await.unwrap();
        assert_eq!(hits, vec!["rate_limit:login:email:a@b.c".to_string()]);
    }

    #[test]
    fn glob_match_edge_cases() {
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
        assert!(glob_match("user*", "user:123"));
        assert!(glob_match("*:all", "users:all"));
        assert!(glob_match("a*b*c", "aXbYc"));
        assert!(!glob_match("a*b*c", "aXbY"));
    }
}
