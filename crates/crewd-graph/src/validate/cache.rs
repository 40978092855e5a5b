//! TTL cache for validation results, keyed by definition content hash.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::issue::ValidationResult;

/// Content hash of a canonical definition payload.
pub type ContentHash = [u8; 32];

/// Computes the cache key for a canonical payload.
pub fn content_hash(payload: &[u8]) -> ContentHash {
    Sha256::digest(payload).into()
}

struct CacheEntry {
    result: ValidationResult,
    inserted_at: Instant,
}

/// Validation result cache.
///
/// Successive validations of a byte-identical definition within the TTL
/// window are served from here; a changed payload misses by hash and expired
/// entries are dropped on access.
pub struct ResultCache {
    ttl: Duration,
    entries: Mutex<HashMap<ContentHash, CacheEntry>>,
}

impl ResultCache {
    /// Creates a cache with the given entry time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached result for a hash, if present and fresh.
    pub fn get(&self, hash: &ContentHash) -> Option<ValidationResult> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(hash) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.result.clone()),
            Some(_) => {
                entries.remove(hash);
                None
            }
            None => None,
        }
    }

    /// Stores a result under a hash.
    pub fn insert(&self, hash: ContentHash, result: ValidationResult) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            hash,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Number of live entries (expired entries included until touched).
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Returns whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_differs_by_content() {
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
        assert_eq!(content_hash(b"a"), content_hash(b"a"));
    }

    #[test]
    fn test_expired_entry_dropped() {
        let cache = ResultCache::new(Duration::ZERO);
        let hash = content_hash(b"payload");
        let result = crate::validate::StructuralValidator::default()
            .validate(&crate::definition::WorkflowDefinition::default())
            .unwrap();
        cache.insert(hash, result);

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&hash).is_none());
        assert!(cache.is_empty());
    }
}
