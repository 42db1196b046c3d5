//! Memoization layer for cross-encoder scores

use super::CrossEncoder;
use anyhow::Result;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

/// Cross-encoder wrapper that remembers per-pair scores. Only pairs missing
/// from the cache reach the inner model, in one batch.
pub struct CachedCrossEncoder {
    inner: Arc<dyn CrossEncoder>,
    cache: Mutex<Cache>,
}

struct Cache {
    entries: HashMap<u64, f32>,
    order: VecDeque<u64>,
    max_size: usize,
}

impl Cache {
    fn insert(&mut self, key: u64, score: f32) {
        if self.entries.insert(key, score).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

impl CachedCrossEncoder {
    pub fn new(inner: Arc<dyn CrossEncoder>, max_size: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(Cache {
                entries: HashMap::new(),
                order: VecDeque::new(),
                max_size: max_size.max(1),
            }),
        }
    }

    fn pair_key(query: &str, passage: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        passage.hash(&mut hasher);
        hasher.finish()
    }

    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CrossEncoder for CachedCrossEncoder {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let keys: Vec<u64> = passages
            .iter()
            .map(|p| Self::pair_key(query, p))
            .collect();

        let mut scores: Vec<Option<f32>> = {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            keys.iter().map(|k| cache.entries.get(k).copied()).collect()
        };

        let missing: Vec<usize> = (0..passages.len())
            .filter(|&i| scores[i].is_none())
            .collect();

        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| passages[i].clone()).collect();
            let fresh = self.inner.score(query, &batch)?;

            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            for (&i, &score) in missing.iter().zip(fresh.iter()) {
                scores[i] = Some(score);
                cache.insert(keys[i], score);
            }
        }

        tracing::trace!(
            hits = passages.len() - missing.len(),
            misses = missing.len(),
            "Cross-encoder cache lookup"
        );

        // A short answer from the inner model leaves holes; the caller checks
        // the count against the passages it sent.
        Ok(scores.into_iter().flatten().collect())
    }
}
