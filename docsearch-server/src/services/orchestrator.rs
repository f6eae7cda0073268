//! Search Orchestrator: the core retrieval pipeline. Expands the query,
//! fetches hybrid hits, hydrates per-document metadata in bulk, scores,
//! filters, diversifies by source, folds in history-enhanced retrieval for
//! follow-ups, and composes the final answer.

use crate::services::history;
use crate::services::scoring;
use docsearch_core::{
  ChatGateway, ChatHistoryEntry, CoreError, DocumentChunk, Embedder, IndexGateway, SearchRequest, SearchResponse,
  SearchResult, NO_INFORMATION_FOUND_MESSAGE,
};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_MIN_SCORE: f32 = 0.15;
const FOLLOW_UP_MIN_SCORE: f32 = 0.05;
const DEFAULT_MAX_SOURCES: usize = 5;
const RELATED_TOPIC_HIGH_SIMILARITY: f32 = 0.75;
const RELATED_TOPIC_LOW_SIMILARITY: f32 = 0.65;
const HISTORY_ENHANCED_TOP: usize = 20;
const HISTORY_ENHANCED_RESULT_CAP: usize = 15;
const SAME_DOCUMENT_BOOST: f32 = 2.5;
const DOCUMENT_REFERENCE_BOOST: f32 = 1.8;
const HISTORY_KEYWORD_BOOST: f32 = 1.3;
const FOLLOW_UP_SATISFIED_THRESHOLD: f32 = 0.15;

struct ScoredHit {
  chunk: DocumentChunk,
  combined: f32,
  vector_score: f32,
}

pub struct SearchOrchestrator {
  index: Arc<dyn IndexGateway>,
  embedder: Arc<dyn Embedder>,
  chat: Arc<dyn ChatGateway>,
  min_score_for_answer: f32,
  max_sources_for_answer: usize,
}

impl SearchOrchestrator {
  pub fn new(index: Arc<dyn IndexGateway>, embedder: Arc<dyn Embedder>, chat: Arc<dyn ChatGateway>) -> Self {
    Self {
      index,
      embedder,
      chat,
      min_score_for_answer: DEFAULT_MIN_SCORE,
      max_sources_for_answer: DEFAULT_MAX_SOURCES,
    }
  }

  pub fn with_answer_thresholds(mut self, min_score_for_answer: f32, max_sources_for_answer: usize) -> Self {
    self.min_score_for_answer = min_score_for_answer;
    self.max_sources_for_answer = max_sources_for_answer;
    self
  }

  /// Runs the pipeline. `ValidationFailed`/`Conflict` propagate as `Err` so
  /// the HTTP layer can surface them as 4xx; `Upstream`/`Timeout`/`Transient`
  /// degrade gracefully into a `success: false` response instead.
  pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, CoreError> {
    match self.try_search(request).await {
      Ok(response) => Ok(response),
      Err(e @ (CoreError::Upstream(_) | CoreError::Timeout(_) | CoreError::Transient(_))) => Ok(SearchResponse {
        query: request.query.clone(),
        expanded_query: None,
        results: Vec::new(),
        generated_answer: None,
        total_results: 0,
        success: false,
        message: Some(e.to_string()),
      }),
      Err(e) => Err(e),
    }
  }

  async fn try_search(&self, request: &SearchRequest) -> Result<SearchResponse, CoreError> {
    if request.query.trim().is_empty() {
      return Err(CoreError::ValidationFailed("query must not be empty".to_string()));
    }
    if !(1..=50).contains(&request.max_results) {
      return Err(CoreError::ValidationFailed("maxResults must be between 1 and 50".to_string()));
    }

    // Step 1: follow-up shortcut, scoped to previously referenced documents.
    if history::is_follow_up(&request.query) && !request.chat_history.is_empty() {
      let document_refs = history::extract_document_references(&request.chat_history);
      if !document_refs.is_empty() {
        return self.run_pipeline(request, Some(&document_refs)).await;
      }
    }

    self.run_pipeline(request, None).await
  }

  async fn run_pipeline(&self, request: &SearchRequest, scoped_to_refs: Option<&[String]>) -> Result<SearchResponse, CoreError> {
    // Step 2: query expansion.
    let expanded_query = if request.enable_query_expansion {
      let expanded = self.chat.expand_query(&request.query, &request.chat_history).await?;
      if expanded.trim().to_lowercase() != request.query.trim().to_lowercase() {
        Some(expanded)
      } else {
        None
      }
    } else {
      None
    };
    let search_query = expanded_query.clone().unwrap_or_else(|| request.query.clone());

    // Step 3: embed.
    let query_vector = self.embedder.embed_one(&search_query).await?;

    // Step 4: hybrid fetch.
    let k = request.max_results as usize * if search_query.chars().count() < 20 { 4 } else { 3 };
    let hits = if request.use_semantic_search {
      self
        .index
        .hybrid_search(&search_query, &query_vector, k, request.document_id.as_deref())
        .await?
    } else {
      let top = (request.max_results as usize * 2).min(50);
      self.index.keyword_search(&search_query, top).await?
    };

    // Step 5: bulk metadata hydrate.
    let mut hydrated = self.hydrate(hits.into_iter().map(|h| (h.chunk, h.backend_score)).collect()).await?;

    // Scoped follow-up: restrict candidates to previously referenced documents.
    if let Some(refs) = scoped_to_refs {
      hydrated.retain(|(chunk, _)| matches_any_reference(chunk, refs));
    }

    // Step 6: score.
    let mut scored: Vec<ScoredHit> = hydrated
      .into_iter()
      .map(|(chunk, vector_score)| {
        let combined = scoring::score(&chunk.content, &search_query, Some(vector_score));
        ScoredHit {
          chunk,
          combined,
          vector_score,
        }
      })
      .collect();

    // Step 7: filter.
    let is_follow_up = history::is_follow_up(&request.query) && !request.chat_history.is_empty();
    let min_score = if is_follow_up { FOLLOW_UP_MIN_SCORE } else { DEFAULT_MIN_SCORE };
    scored.retain(|h| h.combined >= min_score);
    scored.sort_by(|a, b| b.combined.partial_cmp(&a.combined).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(request.max_results as usize);

    // Step 8: diversify by source document.
    let distinct_documents = count_distinct_documents(&scored);
    let is_first_question = request.chat_history.is_empty();
    let max_sources = if is_first_question || distinct_documents > 1 {
      10.min(distinct_documents.max(1))
    } else {
      DEFAULT_MAX_SOURCES
    };
    let take = (request.max_results as usize).min(max_sources);
    let mut diversified = diversify(scored, take);

    // Step 9: history-enhanced second pass.
    if !request.chat_history.is_empty() {
      let related = self.is_related_topic(&query_vector, &request.chat_history, &search_query).await;
      if is_follow_up || related {
        let enhanced = self
          .history_enhanced_retrieval(request, &search_query, &query_vector, &diversified)
          .await?;
        diversified = merge_preferring_enhanced(enhanced, diversified, request.max_results as usize);
      }
    }

    let results: Vec<SearchResult> = diversified
      .iter()
      .map(|h| SearchResult::from_chunk(&h.chunk, None, h.combined, h.vector_score))
      .collect();

    // Step 10: answer.
    let generated_answer = if request.include_answer {
      Some(self.compose_answer(request, &search_query, &results).await?)
    } else {
      None
    };

    Ok(SearchResponse {
      query: request.query.clone(),
      expanded_query,
      total_results: results.len(),
      results,
      generated_answer,
      success: true,
      message: None,
    })
  }

  async fn hydrate(&self, hits: Vec<(DocumentChunk, f32)>) -> Result<Vec<(DocumentChunk, f32)>, CoreError> {
    let document_ids: Vec<String> = {
      let mut ids: Vec<String> = hits.iter().map(|(c, _)| c.document_id.clone()).collect();
      ids.sort();
      ids.dedup();
      ids
    };
    let chunk0s = self.index.get_chunk0s(&document_ids).await?;
    let by_document: HashMap<&str, &DocumentChunk> = chunk0s.iter().map(|c| (c.document_id.as_str(), c)).collect();

    Ok(
      hits
        .into_iter()
        .map(|(mut chunk, score)| {
          if !chunk.is_metadata_carrier() {
            if let Some(source) = by_document.get(chunk.document_id.as_str()) {
              chunk.original_file_name = chunk.original_file_name.clone().or_else(|| source.original_file_name.clone());
              chunk.content_type = chunk.content_type.clone().or_else(|| source.content_type.clone());
              chunk.file_size_bytes = chunk.file_size_bytes.or(source.file_size_bytes);
              chunk.blob_path = chunk.blob_path.clone().or_else(|| source.blob_path.clone());
              chunk.blob_container = chunk.blob_container.clone().or_else(|| source.blob_container.clone());
              chunk.text_content_blob_path =
                chunk.text_content_blob_path.clone().or_else(|| source.text_content_blob_path.clone());
            }
          }
          (chunk, score)
        })
        .collect(),
    )
  }

  async fn is_related_topic(&self, query_vector: &[f32], history: &[ChatHistoryEntry], search_query: &str) -> bool {
    let recent_user_turns: Vec<&str> = history
      .iter()
      .rev()
      .filter(|e| e.role == docsearch_core::ChatRole::User)
      .take(3)
      .map(|e| e.content.as_str())
      .collect();

    for turn in &recent_user_turns {
      let Ok(turn_vector) = self.embedder.embed_one(turn).await else {
        continue;
      };
      let similarity = history::cosine_similarity(query_vector, &turn_vector);
      if similarity >= RELATED_TOPIC_HIGH_SIMILARITY {
        return true;
      }
      if similarity >= RELATED_TOPIC_LOW_SIMILARITY && shares_question_structure(search_query, turn) {
        return true;
      }
    }
    false
  }

  /// History-enhanced retrieval (§4.5): re-ranks a fresh hybrid fetch with
  /// keyword/reference boosts, and, when a context set is already present,
  /// additionally tries a same-document-restricted variant.
  async fn history_enhanced_retrieval(
    &self,
    request: &SearchRequest,
    search_query: &str,
    query_vector: &[f32],
    context_set: &[ScoredHit],
  ) -> Result<Vec<ScoredHit>, CoreError> {
    let history_keywords = history::extract_history_keywords(&request.chat_history);
    let document_references = history::extract_document_references(&request.chat_history);

    let hits = self
      .index
      .hybrid_search(search_query, query_vector, HISTORY_ENHANCED_TOP, None)
      .await?;
    let hydrated = self.hydrate(hits.into_iter().map(|h| (h.chunk, h.backend_score)).collect()).await?;

    let mut boosted: Vec<ScoredHit> = hydrated
      .into_iter()
      .map(|(chunk, vector_score)| {
        let base = scoring::score(&chunk.content, search_query, Some(vector_score));
        let boosted = apply_boosts(&chunk, base, &document_references, &history_keywords);
        ScoredHit {
          chunk,
          combined: boosted,
          vector_score,
        }
      })
      .collect();
    boosted.sort_by(|a, b| b.combined.partial_cmp(&a.combined).unwrap_or(std::cmp::Ordering::Equal));
    boosted.truncate(HISTORY_ENHANCED_RESULT_CAP);

    if !context_set.is_empty() {
      let context_documents: std::collections::HashSet<String> =
        context_set.iter().map(|h| h.chunk.document_id.clone()).collect();
      let scoped_hits = self
        .index
        .hybrid_search(search_query, query_vector, HISTORY_ENHANCED_TOP, None)
        .await?;
      let scoped_hydrated = self
        .hydrate(scoped_hits.into_iter().map(|h| (h.chunk, h.backend_score)).collect())
        .await?;

      let mut scoped_scored: Vec<ScoredHit> = scoped_hydrated
        .into_iter()
        .filter(|(chunk, _)| context_documents.contains(&chunk.document_id))
        .map(|(chunk, vector_score)| {
          let base = scoring::score(&chunk.content, search_query, Some(vector_score));
          ScoredHit {
            chunk,
            combined: base * SAME_DOCUMENT_BOOST,
            vector_score,
          }
        })
        .collect();

      if scoped_scored.iter().any(|h| h.combined > FOLLOW_UP_SATISFIED_THRESHOLD) {
        boosted.append(&mut scoped_scored);
        boosted.sort_by(|a, b| b.combined.partial_cmp(&a.combined).unwrap_or(std::cmp::Ordering::Equal));
        boosted = diversify(boosted, context_set.len().max(1).min(request.max_results as usize));
      }
    }

    Ok(boosted)
  }

  async fn compose_answer(&self, request: &SearchRequest, search_query: &str, results: &[SearchResult]) -> Result<String, CoreError> {
    if !results.is_empty() {
      return if request.chat_history.is_empty() {
        self.chat.answer(search_query, results).await
      } else {
        self.chat.answer_with_history(search_query, results, &request.chat_history).await
      };
    }

    let content_bearing_keywords = history::extract_history_keywords(&request.chat_history);
    if content_bearing_keywords.len() >= 2 {
      let enhanced = self
        .history_enhanced_retrieval(request, search_query, &self.embedder.embed_one(search_query).await?, &[])
        .await?;
      if !enhanced.is_empty() {
        let enhanced_results: Vec<SearchResult> = enhanced
          .iter()
          .map(|h| SearchResult::from_chunk(&h.chunk, None, h.combined, h.vector_score))
          .collect();
        return self.chat.answer_with_history(search_query, &enhanced_results, &request.chat_history).await;
      }
      return self.chat.answer_with_history(search_query, &[], &request.chat_history).await;
    }

    Ok(NO_INFORMATION_FOUND_MESSAGE.to_string())
  }
}

fn count_distinct_documents(hits: &[ScoredHit]) -> usize {
  let mut ids: Vec<&str> = hits.iter().map(|h| h.chunk.document_id.as_str()).collect();
  ids.sort_unstable();
  ids.dedup();
  ids.len()
}

/// Keeps the single best-scoring chunk per document, ordered by score desc,
/// truncated to `take`.
fn diversify(mut hits: Vec<ScoredHit>, take: usize) -> Vec<ScoredHit> {
  hits.sort_by(|a, b| b.combined.partial_cmp(&a.combined).unwrap_or(std::cmp::Ordering::Equal));
  let mut seen = std::collections::HashSet::new();
  let mut best_per_document = Vec::new();
  for hit in hits {
    if seen.insert(hit.chunk.document_id.clone()) {
      best_per_document.push(hit);
    }
  }
  best_per_document.truncate(take);
  best_per_document
}

fn merge_preferring_enhanced(enhanced: Vec<ScoredHit>, base: Vec<ScoredHit>, max_results: usize) -> Vec<ScoredHit> {
  let mut seen: std::collections::HashSet<String> = enhanced.iter().map(|h| h.chunk.document_id.clone()).collect();
  let mut merged = enhanced;
  for hit in base {
    if merged.len() >= max_results {
      break;
    }
    if seen.insert(hit.chunk.document_id.clone()) {
      merged.push(hit);
    }
  }
  merged.sort_by(|a, b| b.combined.partial_cmp(&a.combined).unwrap_or(std::cmp::Ordering::Equal));
  merged.truncate(max_results);
  merged
}

fn apply_boosts(chunk: &DocumentChunk, base: f32, document_references: &[String], history_keywords: &[String]) -> f32 {
  let haystack = format!(
    "{} {} {}",
    chunk.document_id,
    chunk.original_file_name.clone().unwrap_or_default(),
    chunk.content
  )
  .to_lowercase();

  let referenced = document_references.iter().any(|r| {
    let r = r.to_lowercase();
    haystack.contains(&r) || r.contains(&chunk.document_id.to_lowercase())
  });
  if referenced {
    return base * DOCUMENT_REFERENCE_BOOST;
  }

  let content_lower = chunk.content.to_lowercase();
  let has_keyword = history_keywords.iter().any(|k| content_lower.contains(&k.to_lowercase()));
  if has_keyword {
    return base * HISTORY_KEYWORD_BOOST;
  }

  base
}

fn matches_any_reference(chunk: &DocumentChunk, refs: &[String]) -> bool {
  let name = chunk.original_file_name.clone().unwrap_or_default().to_lowercase();
  refs.iter().any(|r| {
    let r = r.to_lowercase();
    name.contains(&r) || r.contains(&name) && !name.is_empty()
  })
}

const ACTION_WORDS: &[&str] = &["configure", "install", "setup", "create", "delete", "update", "enable", "disable"];

fn shares_question_structure(a: &str, b: &str) -> bool {
  let a_lower = a.to_lowercase();
  let b_lower = b.to_lowercase();
  ACTION_WORDS.iter().any(|w| a_lower.contains(w) && b_lower.contains(w))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chunk(document_id: &str, name: &str, content: &str) -> DocumentChunk {
    DocumentChunk {
      id: docsearch_core::ChunkId::new(document_id, 0),
      document_id: document_id.to_string(),
      chunk_index: 0,
      content: content.to_string(),
      embedding: vec![0.0; 4],
      metadata: None,
      created_at: chrono::Utc::now(),
      original_file_name: Some(name.to_string()),
      content_type: Some("text/plain".to_string()),
      file_size_bytes: Some(10),
      blob_path: Some(format!("{document_id}_{name}")),
      blob_container: Some("documents".to_string()),
      text_content_blob_path: None,
    }
  }

  fn hit(document_id: &str, name: &str, combined: f32) -> ScoredHit {
    ScoredHit {
      chunk: chunk(document_id, name, "content"),
      combined,
      vector_score: combined,
    }
  }

  #[test]
  fn diversify_keeps_best_chunk_per_document() {
    let hits = vec![hit("doc-a", "a.txt", 0.5), hit("doc-a", "a.txt", 0.9), hit("doc-b", "b.txt", 0.3)];
    let result = diversify(hits, 5);
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].chunk.document_id, "doc-a");
    assert_eq!(result[0].combined, 0.9);
  }

  #[test]
  fn diversify_truncates_to_take() {
    let hits = vec![hit("doc-a", "a.txt", 0.9), hit("doc-b", "b.txt", 0.8), hit("doc-c", "c.txt", 0.7)];
    assert_eq!(diversify(hits, 2).len(), 2);
  }

  #[test]
  fn document_reference_boost_outranks_keyword_boost() {
    let c = chunk("doc-a", "report.pdf", "some content");
    let with_reference = apply_boosts(&c, 0.5, &["report.pdf".to_string()], &[]);
    let with_keyword = apply_boosts(&c, 0.5, &[], &["content".to_string()]);
    assert!(with_reference > with_keyword);
  }

  #[test]
  fn merge_prefers_enhanced_then_fills_from_base() {
    let enhanced = vec![hit("doc-a", "a.txt", 0.9)];
    let base = vec![hit("doc-a", "a.txt", 0.99), hit("doc-b", "b.txt", 0.6)];
    let merged = merge_preferring_enhanced(enhanced, base, 5);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].chunk.document_id, "doc-a");
    assert_eq!(merged[0].combined, 0.9);
  }
}
