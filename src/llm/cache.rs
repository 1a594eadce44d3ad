//! Response Cache: `(contentHash, model) -> LLMScore`, strictly an
//! optimization — losing entries must not affect correctness.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::{ContentHash, LLMScore};

fn fingerprint(content_hash: &ContentHash, model: &str) -> String {
    format!("{content_hash}:{model}")
}

/// Concurrent map keyed by `"{content_hash}:{model}"`. Values are stored
/// as serialized `LLMScore` JSON so a `get` can never return a type that
/// silently differs from what was cached.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn put(&self, content_hash: &ContentHash, model: &str, score: &LLMScore) {
        let key = fingerprint(content_hash, model);
        if let Ok(serialized) = serde_json::to_string(score) {
            self.entries.write().await.insert(key, serialized);
        }
    }

    /// Returns `None` both on a genuine miss and on any decode failure —
    /// malformed entries are indistinguishable from misses.
    pub async fn get(&self, content_hash: &ContentHash, model: &str) -> Option<LLMScore> {
        let key = fingerprint(content_hash, model);
        let raw = self.entries.read().await.get(&key).cloned()?;
        serde_json::from_str(&raw).ok()
    }

    /// Remove by the literal cache key (e.g. `"article:<id>"`). Absence
    /// is not an error; returns whether an entry was actually removed.
    pub async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn remove(&self, content_hash: &ContentHash, model: &str) -> bool {
        self.delete(&fingerprint(content_hash, model)).await
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
