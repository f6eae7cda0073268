//! Trait contracts for the external collaborators the core pipeline depends
//! on: the hybrid search backend, blob storage, the embedding model and the
//! chat model. Concrete adapters live in `docsearch-server::services`.

use crate::error::CoreError;
use crate::model::DocumentChunk;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A single field of the index's logical schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
  pub name: &'static str,
  pub kind: FieldKind,
  pub filterable: bool,
  pub sortable: bool,
}

#[derive(Debug, Clone)]
pub enum FieldKind {
  Keyword,
  Text,
  Integer,
  Timestamp,
  Vector { dim: usize, metric: VectorMetric },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorMetric {
  Cosine,
}

/// ANN parameters for the vector field (HNSW recommended defaults).
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
  pub m: u32,
  pub ef_construction: u32,
  pub ef_search: u32,
}

impl Default for HnswParams {
  fn default() -> Self {
    Self {
      m: 4,
      ef_construction: 400,
      ef_search: 500,
    }
  }
}

/// A single ranked hit returned by the index backend, prior to scoring.
#[derive(Debug, Clone)]
pub struct IndexHit {
  pub chunk: DocumentChunk,
  pub backend_score: f32,
}

/// Contract with the external hybrid (keyword + vector) search backend.
///
/// Implementations MUST NOT partially succeed silently on `index_chunks`:
/// every chunk either lands or is reported as a failure.
#[async_trait]
pub trait IndexGateway: Send + Sync {
  /// Ensures the index exists with the logical schema; ALTER-adds any
  /// missing per-document metadata field without losing data.
  async fn initialize(&self, fields: &[FieldSpec], hnsw: HnswParams) -> Result<(), CoreError>;

  /// Uploads/replaces chunks by id. Returns `(success_count, failure_count)`.
  async fn index_chunks(&self, chunks: &[DocumentChunk]) -> Result<(usize, usize), CoreError>;

  async fn keyword_search(&self, query: &str, top: usize) -> Result<Vec<IndexHit>, CoreError>;

  async fn vector_search(&self, vector: &[f32], top: usize) -> Result<Vec<IndexHit>, CoreError>;

  /// Backend-fused lexical + ANN ranking, optionally filtered to one
  /// document. May return up to `min(top * 3, 100)` hits.
  async fn hybrid_search(
    &self,
    query: &str,
    vector: &[f32],
    top: usize,
    filter_document_id: Option<&str>,
  ) -> Result<Vec<IndexHit>, CoreError>;

  /// Returns chunk 0 of each present `documentId`, in one round trip.
  async fn get_chunk0s(&self, document_ids: &[String]) -> Result<Vec<DocumentChunk>, CoreError>;

  async fn document_exists(&self, document_id: &str) -> Result<bool, CoreError>;

  /// Deletes every chunk of a document. Returns true iff all deletes
  /// succeeded; a document with zero remaining chunks is a success.
  async fn delete_document(&self, document_id: &str) -> Result<bool, CoreError>;

  async fn get_chunk_count(&self, document_id: &str) -> Result<usize, CoreError>;

  async fn get_last_updated(&self, document_id: &str) -> Result<Option<DateTime<Utc>>, CoreError>;

  async fn get_top_chunks(&self, document_id: &str, n: usize) -> Result<Vec<DocumentChunk>, CoreError>;

  async fn get_adjacent_chunks(
    &self,
    document_id: &str,
    chunk_index: u32,
    k: usize,
  ) -> Result<Vec<DocumentChunk>, CoreError>;

  /// Lists distinct documents, newest first, for `GET /documents`.
  async fn list_documents(
    &self,
    max_results: usize,
    skip: usize,
    document_id_filter: Option<&str>,
  ) -> Result<Vec<crate::model::DocumentSummary>, CoreError>;
}

/// Contract with object/blob storage for originals and extracted text.
#[async_trait]
pub trait BlobGateway: Send + Sync {
  /// Uploads `bytes` under `key`, tagging it with the given content type and
  /// metadata, and returns the key it was actually stored under.
  async fn upload(
    &self,
    key: &str,
    bytes: &[u8],
    content_type: &str,
    metadata: &BlobMetadata,
  ) -> Result<String, CoreError>;

  async fn download(&self, key: &str) -> Result<Vec<u8>, CoreError>;

  async fn delete(&self, key: &str) -> Result<(), CoreError>;

  async fn exists(&self, key: &str) -> Result<bool, CoreError>;
}

#[derive(Debug, Clone)]
pub struct BlobMetadata {
  pub document_id: String,
  pub original_file_name: String,
  pub original_file_name_base64: String,
  pub uploaded_at: DateTime<Utc>,
  pub file_size: i64,
}

/// Contract with the embedding model. Batches are bounded and cached by the
/// implementation; callers always see a fixed-dimension vector per text.
#[async_trait]
pub trait Embedder: Send + Sync {
  fn dimension(&self) -> usize;

  async fn embed_one(&self, text: &str) -> Result<Vec<f32>, CoreError>;

  async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError>;
}

/// Contract with the chat model, grounded over already-retrieved results.
#[async_trait]
pub trait ChatGateway: Send + Sync {
  async fn answer(&self, query: &str, results: &[crate::model::SearchResult]) -> Result<String, CoreError>;

  async fn answer_with_history(
    &self,
    query: &str,
    results: &[crate::model::SearchResult],
    history: &[crate::model::ChatHistoryEntry],
  ) -> Result<String, CoreError>;

  /// Reformulates `query` given chat history, for query expansion. Returns
  /// the original query unchanged when the model has nothing to add.
  async fn expand_query(&self, query: &str, history: &[crate::model::ChatHistoryEntry]) -> Result<String, CoreError>;
}
