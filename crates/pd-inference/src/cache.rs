//! Content-addressed, TTL-bounded response cache.
//!
//! Keys hash the prompt text, the schema id and a digest of the image bytes,
//! so identical repeated questions skip the provider round-trip. Expiry is
//! lazy: an entry older than the TTL is removed by the read that finds it,
//! under the same lock as the read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use pd_protocol::inference::{InferenceResult, SchemaId};

/// Hex-encoded SHA-256 over `prompt ‖ schema ‖ sha256(image)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute(prompt: &str, schema: SchemaId, image: &[u8]) -> Self {
        let image_digest = Sha256::digest(image);

        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        hasher.update([0u8]);
        hasher.update(schema.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(image_digest);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CacheEntry {
    value: InferenceResult,
    stored_at: Instant,
}

/// Counters exposed for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
}

/// Thread-safe result cache shared across diagnosis requests.
pub struct ResponseCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a result. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<InferenceResult> {
        let mut entries = self.lock();
        let fresh = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        };
        drop(entries);

        if fresh.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        fresh
    }

    /// Store a validated result, replacing any previous entry for the key.
    pub fn insert(&self, key: CacheKey, value: InferenceResult) {
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            self.purge_locked(&mut entries);
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        self.purge_locked(&mut entries)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn purge_locked(&self, entries: &mut HashMap<CacheKey, CacheEntry>) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() <= self.ttl);
        let removed = before - entries.len();
        self.expirations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_protocol::stages::{FeatureDimension, GateStage};

    fn result(choice: &str) -> InferenceResult {
        InferenceResult {
            choice: choice.into(),
            confidence: 0.9,
            rationale: Some("clear view".into()),
            alternates: None,
            provider: "ollama".into(),
            from_cache: false,
        }
    }

    const SCHEMA: SchemaId = SchemaId::Gate(GateStage::ContentType);

    #[tokio::test(start_paused = true)]
    async fn roundtrip_then_expiry() {
        let cache = ResponseCache::new(Duration::from_secs(60), 16);
        let key = CacheKey::compute("what is this?", SCHEMA, b"jpeg-bytes");

        cache.insert(key.clone(), result("plant"));
        assert_eq!(cache.get(&key), Some(result("plant")));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty(), "expired entry removed on read");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_at_exact_ttl_is_fresh() {
        let cache = ResponseCache::new(Duration::from_secs(10), 16);
        let key = CacheKey::compute("p", SCHEMA, b"img");
        cache.insert(key.clone(), result("plant"));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn different_images_never_collide() {
        let a = CacheKey::compute("same prompt", SCHEMA, b"image-a");
        let b = CacheKey::compute("same prompt", SCHEMA, b"image-b");
        assert_ne!(a, b);
        assert_eq!(a, CacheKey::compute("same prompt", SCHEMA, b"image-a"));
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn schema_is_part_of_key() {
        let a = CacheKey::compute("p", SCHEMA, b"img");
        let b = CacheKey::compute(
            "p",
            SchemaId::Feature(FeatureDimension::SymptomType),
            b"img",
        );
        assert_ne!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_oldest() {
        let cache = ResponseCache::new(Duration::from_secs(600), 2);
        let k1 = CacheKey::compute("p1", SCHEMA, b"img");
        let k2 = CacheKey::compute("p2", SCHEMA, b"img");
        let k3 = CacheKey::compute("p3", SCHEMA, b"img");

        cache.insert(k1.clone(), result("plant"));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.insert(k2.clone(), result("animal"));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.insert(k3.clone(), result("object"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&k1).is_none());
        assert!(cache.get(&k2).is_some());
        assert!(cache.get(&k3).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let cache = ResponseCache::new(Duration::from_secs(5), 16);
        cache.insert(CacheKey::compute("old", SCHEMA, b"i"), result("plant"));
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.insert(CacheKey::compute("new", SCHEMA, b"i"), result("plant"));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
