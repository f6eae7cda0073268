//! End-to-end coverage over in-memory fakes of the four gateway traits:
//! ingest a document, search for it, ask an unrelated question, then delete
//! it and confirm it's gone.

use async_trait::async_trait;
use chrono::Utc;
use docsearch_core::{
  BlobGateway, BlobMetadata, ChatGateway, ChatHistoryEntry, CoreError, DocumentChunk, Embedder, FieldSpec,
  HnswParams, IndexGateway, IndexHit, SearchRequest, NO_INFORMATION_FOUND_MESSAGE,
};
use docsearch_server::services::{IngestPipeline, IngestRequest, SearchOrchestrator};
use docsearch_server::config::UploadConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A tiny bag-of-words "embedding" over a fixed vocabulary, just large
/// enough to make cosine similarity distinguish the fixture documents used
/// below. Not a real embedding model.
struct FakeEmbedder {
  vocabulary: Vec<&'static str>,
}

impl FakeEmbedder {
  fn new() -> Self {
    Self {
      vocabulary: vec!["azure", "blob", "stores", "files", "containers", "group", "blobs", "keys", "unique", "xyzzy"],
    }
  }

  fn vectorize(&self, text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v: Vec<f32> = self
      .vocabulary
      .iter()
      .map(|word| if lower.contains(word) { 1.0 } else { 0.0 })
      .collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
      for x in v.iter_mut() {
        *x /= norm;
      }
    }
    v
  }
}

#[async_trait]
impl Embedder for FakeEmbedder {
  fn dimension(&self) -> usize {
    self.vocabulary.len()
  }

  async fn embed_one(&self, text: &str) -> Result<Vec<f32>, CoreError> {
    Ok(self.vectorize(text))
  }

  async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
    Ok(texts.iter().map(|t| self.vectorize(t)).collect())
  }
}

struct FakeChat;

#[async_trait]
impl ChatGateway for FakeChat {
  async fn answer(&self, _query: &str, results: &[docsearch_core::SearchResult]) -> Result<String, CoreError> {
    if results.is_empty() {
      return Ok(NO_INFORMATION_FOUND_MESSAGE.to_string());
    }
    Ok(format!(
      "According to Source 1 ({}): {}",
      results[0].original_file_name.clone().unwrap_or_default(),
      results[0].content
    ))
  }

  async fn answer_with_history(
    &self,
    query: &str,
    results: &[docsearch_core::SearchResult],
    _history: &[ChatHistoryEntry],
  ) -> Result<String, CoreError> {
    self.answer(query, results).await
  }

  async fn expand_query(&self, query: &str, _history: &[ChatHistoryEntry]) -> Result<String, CoreError> {
    Ok(query.to_string())
  }
}

struct FakeBlob {
  objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeBlob {
  fn new() -> Self {
    Self { objects: Mutex::new(HashMap::new()) }
  }
}

#[async_trait]
impl BlobGateway for FakeBlob {
  async fn upload(&self, key: &str, bytes: &[u8], _content_type: &str, _metadata: &BlobMetadata) -> Result<String, CoreError> {
    self.objects.lock().unwrap().insert(key.to_string(), bytes.to_vec());
    Ok(key.to_string())
  }

  async fn download(&self, key: &str) -> Result<Vec<u8>, CoreError> {
    self
      .objects
      .lock()
      .unwrap()
      .get(key)
      .cloned()
      .ok_or_else(|| CoreError::NotFound(format!("no such object: {key}")))
  }

  async fn delete(&self, key: &str) -> Result<(), CoreError> {
    self.objects.lock().unwrap().remove(key);
    Ok(())
  }

  async fn exists(&self, key: &str) -> Result<bool, CoreError> {
    Ok(self.objects.lock().unwrap().contains_key(key))
  }
}

struct FakeIndex {
  embedder: FakeEmbedder,
  chunks: Mutex<HashMap<String, DocumentChunk>>,
}

impl FakeIndex {
  fn new() -> Self {
    Self {
      embedder: FakeEmbedder::new(),
      chunks: Mutex::new(HashMap::new()),
    }
  }

  fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
      0.0
    } else {
      dot / (na * nb)
    }
  }
}

#[async_trait]
impl IndexGateway for FakeIndex {
  async fn initialize(&self, _fields: &[FieldSpec], _hnsw: HnswParams) -> Result<(), CoreError> {
    Ok(())
  }

  async fn index_chunks(&self, chunks: &[DocumentChunk]) -> Result<(usize, usize), CoreError> {
    let mut store = self.chunks.lock().unwrap();
    for chunk in chunks {
      store.insert(chunk.id.0.clone(), chunk.clone());
    }
    Ok((chunks.len(), 0))
  }

  async fn keyword_search(&self, query: &str, top: usize) -> Result<Vec<IndexHit>, CoreError> {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let store = self.chunks.lock().unwrap();
    let mut hits: Vec<IndexHit> = store
      .values()
      .filter_map(|chunk| {
        let content_lower = chunk.content.to_lowercase();
        let matches = words.iter().filter(|w| content_lower.contains(**w)).count();
        if matches == 0 {
          None
        } else {
          Some(IndexHit {
            chunk: chunk.clone(),
            backend_score: matches as f32 / words.len().max(1) as f32,
          })
        }
      })
      .collect();
    hits.sort_by(|a, b| b.backend_score.partial_cmp(&a.backend_score).unwrap());
    hits.truncate(top);
    Ok(hits)
  }

  async fn vector_search(&self, vector: &[f32], top: usize) -> Result<Vec<IndexHit>, CoreError> {
    let store = self.chunks.lock().unwrap();
    let mut hits: Vec<IndexHit> = store
      .values()
      .map(|chunk| IndexHit {
        chunk: chunk.clone(),
        backend_score: Self::cosine(vector, &chunk.embedding),
      })
      .collect();
    hits.sort_by(|a, b| b.backend_score.partial_cmp(&a.backend_score).unwrap());
    hits.truncate(top);
    Ok(hits)
  }

  async fn hybrid_search(
    &self,
    query: &str,
    vector: &[f32],
    top: usize,
    filter_document_id: Option<&str>,
  ) -> Result<Vec<IndexHit>, CoreError> {
    let semantic = self.vector_search(vector, top).await?;
    let keyword = self.keyword_search(query, top).await?;
    let mut seen: std::collections::HashSet<String> = semantic.iter().map(|h| h.chunk.id.0.clone()).collect();
    let mut merged = semantic;
    for hit in keyword {
      if seen.insert(hit.chunk.id.0.clone()) {
        merged.push(hit);
      }
    }
    if let Some(document_id) = filter_document_id {
      merged.retain(|h| h.chunk.document_id == document_id);
    }
    merged.truncate(top);
    Ok(merged)
  }

  async fn get_chunk0s(&self, document_ids: &[String]) -> Result<Vec<DocumentChunk>, CoreError> {
    let store = self.chunks.lock().unwrap();
    Ok(
      store
        .values()
        .filter(|c| c.chunk_index == 0 && document_ids.contains(&c.document_id))
        .cloned()
        .collect(),
    )
  }

  async fn document_exists(&self, document_id: &str) -> Result<bool, CoreError> {
    Ok(self.chunks.lock().unwrap().values().any(|c| c.document_id == document_id))
  }

  async fn delete_document(&self, document_id: &str) -> Result<bool, CoreError> {
    self.chunks.lock().unwrap().retain(|_, c| c.document_id != document_id);
    Ok(true)
  }

  async fn get_chunk_count(&self, document_id: &str) -> Result<usize, CoreError> {
    Ok(self.chunks.lock().unwrap().values().filter(|c| c.document_id == document_id).count())
  }

  async fn get_last_updated(&self, document_id: &str) -> Result<Option<chrono::DateTime<Utc>>, CoreError> {
    Ok(self.chunks.lock().unwrap().values().filter(|c| c.document_id == document_id).map(|c| c.created_at).max())
  }

  async fn get_top_chunks(&self, document_id: &str, n: usize) -> Result<Vec<DocumentChunk>, CoreError> {
    let store = self.chunks.lock().unwrap();
    let mut chunks: Vec<DocumentChunk> = store.values().filter(|c| c.document_id == document_id).cloned().collect();
    chunks.sort_by_key(|c| c.chunk_index);
    chunks.truncate(n);
    Ok(chunks)
  }

  async fn get_adjacent_chunks(&self, document_id: &str, chunk_index: u32, k: usize) -> Result<Vec<DocumentChunk>, CoreError> {
    let lo = chunk_index.saturating_sub(k as u32);
    let hi = chunk_index + k as u32;
    let store = self.chunks.lock().unwrap();
    Ok(
      store
        .values()
        .filter(|c| c.document_id == document_id && c.chunk_index >= lo && c.chunk_index <= hi)
        .cloned()
        .collect(),
    )
  }

  async fn list_documents(
    &self,
    _max_results: usize,
    _skip: usize,
    _document_id_filter: Option<&str>,
  ) -> Result<Vec<docsearch_core::model::DocumentSummary>, CoreError> {
    Ok(Vec::new())
  }
}

fn upload_config() -> UploadConfig {
  UploadConfig {
    max_mb: 20,
    allowed_ext: vec!["txt".to_string(), "md".to_string()],
    default_chunk_size: 1000,
    default_chunk_overlap: 0,
  }
}

fn harness() -> (Arc<FakeIndex>, IngestPipeline, SearchOrchestrator) {
  let index = Arc::new(FakeIndex::new());
  let blob = Arc::new(FakeBlob::new());
  let embedder = Arc::new(FakeEmbedder::new());
  let chat = Arc::new(FakeChat);

  let ingest = IngestPipeline::new(
    index.clone() as Arc<dyn IndexGateway>,
    blob.clone() as Arc<dyn BlobGateway>,
    embedder.clone() as Arc<dyn Embedder>,
    "documents".to_string(),
  );
  let orchestrator = SearchOrchestrator::new(
    index.clone() as Arc<dyn IndexGateway>,
    embedder as Arc<dyn Embedder>,
    chat as Arc<dyn ChatGateway>,
  )
  .with_answer_thresholds(0.15, 5);

  (index, ingest, orchestrator)
}

#[tokio::test]
async fn ingests_and_finds_a_document_with_a_grounded_answer() {
  let (_index, ingest, orchestrator) = harness();

  let request = IngestRequest {
    file_name: "note.txt".to_string(),
    content_type: "text/plain".to_string(),
    bytes: b"Azure Blob stores files. Containers group blobs. Keys are unique.".to_vec(),
    desired_document_id: Some("doc-a".to_string()),
    user_metadata: None,
    chunk_size: 1000,
    chunk_overlap: 0,
  };
  let response = ingest.ingest(request, &upload_config()).await.expect("ingest should succeed");
  assert!(response.success, "{}", response.message);
  assert_eq!(response.chunks_created, 1);
  assert_eq!(response.document_id.as_deref(), Some("doc-a"));

  let search_request = SearchRequest {
    query: "blob container".to_string(),
    max_results: 5,
    use_semantic_search: true,
    document_id: None,
    enable_query_expansion: false,
    include_answer: true,
    chat_history: Vec::new(),
  };
  let search_response = orchestrator.search(&search_request).await.expect("search should succeed");
  assert!(search_response.success);
  assert!(!search_response.results.is_empty());
  assert!(search_response.results.iter().all(|r| r.document_id == "doc-a"));
  assert!(search_response.results[0].score >= 0.15);
  let answer = search_response.generated_answer.expect("expected a generated answer");
  assert!(answer.contains("Source 1"));
}

#[tokio::test]
async fn unrelated_query_returns_the_fixed_no_information_message() {
  let (_index, ingest, orchestrator) = harness();
  let request = IngestRequest {
    file_name: "note.txt".to_string(),
    content_type: "text/plain".to_string(),
    bytes: b"Azure Blob stores files. Containers group blobs. Keys are unique.".to_vec(),
    desired_document_id: Some("doc-a".to_string()),
    user_metadata: None,
    chunk_size: 1000,
    chunk_overlap: 0,
  };
  ingest.ingest(request, &upload_config()).await.expect("ingest should succeed");

  let search_request = SearchRequest {
    query: "unrelated xyzzy".to_string(),
    max_results: 5,
    use_semantic_search: true,
    document_id: None,
    enable_query_expansion: false,
    include_answer: true,
    chat_history: Vec::new(),
  };
  let response = orchestrator.search(&search_request).await.expect("search should succeed");
  assert!(response.success);
  assert!(response.results.is_empty());
  assert_eq!(response.generated_answer.as_deref(), Some(NO_INFORMATION_FOUND_MESSAGE));
}

#[tokio::test]
async fn deleting_a_document_removes_it_from_subsequent_searches() {
  let (index, ingest, orchestrator) = harness();
  let request = IngestRequest {
    file_name: "note.txt".to_string(),
    content_type: "text/plain".to_string(),
    bytes: b"Azure Blob stores files. Containers group blobs. Keys are unique.".to_vec(),
    desired_document_id: Some("doc-a".to_string()),
    user_metadata: None,
    chunk_size: 1000,
    chunk_overlap: 0,
  };
  ingest.ingest(request, &upload_config()).await.expect("ingest should succeed");
  assert!(index.document_exists("doc-a").await.unwrap());

  assert!(index.delete_document("doc-a").await.unwrap());
  assert!(!index.document_exists("doc-a").await.unwrap());

  let search_request = SearchRequest {
    query: "blob".to_string(),
    max_results: 5,
    use_semantic_search: true,
    document_id: None,
    enable_query_expansion: false,
    include_answer: true,
    chat_history: Vec::new(),
  };
  let response = orchestrator.search(&search_request).await.expect("search should succeed");
  assert!(response.results.iter().all(|r| r.document_id != "doc-a"));
}

#[tokio::test]
async fn deleting_a_nonexistent_document_is_a_success_with_no_side_effects() {
  let (index, _ingest, _orchestrator) = harness();
  assert!(index.delete_document("does-not-exist").await.unwrap());
}
