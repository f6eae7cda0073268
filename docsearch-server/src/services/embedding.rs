//! Embedder implementation: wraps `docsearch_ai::AiService` behind the
//! `Embedder` contract, with a process-wide, size-bounded cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use docsearch_ai::AiAdapter;
use docsearch_core::{CoreError, Embedder};
use std::sync::Arc;
use tokio::time::Duration;

const ABSOLUTE_TTL: Duration = Duration::from_secs(2 * 60 * 60);
const SLIDING_TTL: Duration = Duration::from_secs(30 * 60);
const MAX_CACHE_ENTRIES: usize = 50_000;
const EMBED_BATCH_SIZE: usize = 10;

struct CacheEntry {
  vector: Vec<f32>,
  created_at: DateTime<Utc>,
  last_hit_at: DateTime<Utc>,
}

/// Normalizes text into the embedding cache key: trim, lowercase, collapse
/// internal whitespace, drop CR/tab.
fn normalize(text: &str) -> String {
  let cleaned: String = text.chars().filter(|c| *c != '\r' && *c != '\t').collect();
  cleaned
    .trim()
    .to_lowercase()
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

/// Caching embedder. The cache is the only mutable shared resource in the
/// pipeline and must tolerate concurrent reads/writes, hence `DashMap`.
pub struct CachingEmbedder {
  adapter: Arc<AiAdapter>,
  dimension: usize,
  cache: DashMap<String, CacheEntry>,
}

impl CachingEmbedder {
  pub fn new(adapter: Arc<AiAdapter>, dimension: usize) -> Self {
    Self {
      adapter,
      dimension,
      cache: DashMap::new(),
    }
  }

  fn get_cached(&self, key: &str) -> Option<Vec<f32>> {
    let now = Utc::now();
    let mut expired = false;
    let result = self.cache.get_mut(key).and_then(|mut entry| {
      let age = now.signed_duration_since(entry.created_at);
      let idle = now.signed_duration_since(entry.last_hit_at);
      if age.to_std().unwrap_or(Duration::MAX) > ABSOLUTE_TTL || idle.to_std().unwrap_or(Duration::MAX) > SLIDING_TTL {
        expired = true;
        None
      } else {
        entry.last_hit_at = now;
        Some(entry.vector.clone())
      }
    });
    if expired {
      self.cache.remove(key);
    }
    result
  }

  fn insert_cache(&self, key: String, vector: Vec<f32>) {
    if self.cache.len() >= MAX_CACHE_ENTRIES {
      // Evict an arbitrary entry rather than scanning for the oldest one;
      // under sustained load this bounds memory without a global lock.
      if let Some(evict_key) = self.cache.iter().next().map(|e| e.key().clone()) {
        self.cache.remove(&evict_key);
      }
    }
    let now = Utc::now();
    self.cache.insert(
      key,
      CacheEntry {
        vector,
        created_at: now,
        last_hit_at: now,
      },
    );
  }
}

#[async_trait]
impl Embedder for CachingEmbedder {
  fn dimension(&self) -> usize {
    self.dimension
  }

  async fn embed_one(&self, text: &str) -> Result<Vec<f32>, CoreError> {
    let key = normalize(text);
    if let Some(cached) = self.get_cached(&key) {
      return Ok(cached);
    }
    let vector = docsearch_ai::AiService::generate_embedding(self.adapter.as_ref(), text)
      .await
      .map_err(CoreError::from)?;
    self.insert_cache(key, vector.clone());
    Ok(vector)
  }

  async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
    let mut results = vec![Vec::new(); texts.len()];
    let mut misses: Vec<(usize, String)> = Vec::new();

    for (i, text) in texts.iter().enumerate() {
      let key = normalize(text);
      if let Some(cached) = self.get_cached(&key) {
        results[i] = cached;
      } else {
        misses.push((i, text.clone()));
      }
    }

    for batch in misses.chunks(EMBED_BATCH_SIZE) {
      let batch_texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
      let embeddings = docsearch_ai::AiService::embed_texts(self.adapter.as_ref(), batch_texts)
        .await
        .map_err(CoreError::from)?;
      for ((idx, text), vector) in batch.iter().zip(embeddings.into_iter()) {
        self.insert_cache(normalize(text), vector.clone());
        results[*idx] = vector;
      }
    }

    Ok(results)
  }
}

#[cfg(test)]
mod tests {
  use super::normalize;

  #[test]
  fn normalization_collapses_whitespace_and_case() {
    assert_eq!(normalize("  Hello\tWorld\r\n "), "hello world");
  }
}
