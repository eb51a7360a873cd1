//! Content-addressed embedding cache.
//!
//! Maps a stable hash of (provider identity, text) to a vector. Bounded
//! size with remove-oldest-inserted eviction: plain FIFO, not LRU — a hit
//! does not refresh an entry's age.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

pub struct EmbeddingCache {
    capacity: usize,
    map: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Stable cache key for a (provider identity, text) pair.
    pub fn key(identity: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<&Vec<f32>> {
        self.map.get(key)
    }

    pub fn insert(&mut self, key: String, vector: Vec<f32>) {
        if self.map.contains_key(&key) {
            self.map.insert(key, vector);
            return;
        }
        if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, vector);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_separates_identity_namespaces() {
        let a = EmbeddingCache::key("openai:small", "hello");
        let b = EmbeddingCache::key("mock:deterministic", "hello");
        assert_ne!(a, b);
        assert_eq!(a, EmbeddingCache::key("openai:small", "hello"));
    }

    #[test]
    fn insert_and_get() {
        let mut cache = EmbeddingCache::new(10);
        let key = EmbeddingCache::key("p", "t");
        cache.insert(key.clone(), vec![1.0, 2.0]);
        assert_eq!(cache.get(&key), Some(&vec![1.0, 2.0]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn fifo_eviction_removes_oldest_inserted() {
        let mut cache = EmbeddingCache::new(2);
        cache.insert("k1".to_string(), vec![1.0]);
        cache.insert("k2".to_string(), vec![2.0]);

        // A hit on k1 does not refresh it: eviction stays insertion-ordered.
        let _ = cache.get("k1");
        cache.insert("k3".to_string(), vec![3.0]);

        assert!(cache.get("k1").is_none());
        assert!(cache.get("k2").is_some());
        assert!(cache.get("k3").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinsert_updates_without_growing() {
        let mut cache = EmbeddingCache::new(2);
        cache.insert("k1".to_string(), vec![1.0]);
        cache.insert("k1".to_string(), vec![9.0]);
        assert_eq!(cache.get("k1"), Some(&vec![9.0]));
        assert_eq!(cache.len(), 1);
    }
}
