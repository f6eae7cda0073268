//! Domain types shared by every component of the search pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Identifier of a chunk, always of the form `<documentId>_<chunkIndex>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ChunkId(pub String);

impl ChunkId {
  pub fn new(document_id: &str, chunk_index: u32) -> Self {
    Self(format!("{document_id}_{chunk_index}"))
  }
}

impl fmt::Display for ChunkId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A unit of retrieval: a contiguous, overlap-aware slice of a document plus
/// its embedding and, on `chunk_index == 0` only, the document's metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentChunk {
  pub id: ChunkId,
  pub document_id: String,
  pub chunk_index: u32,
  pub content: String,
  pub embedding: Vec<f32>,
  pub metadata: Option<String>,
  pub created_at: DateTime<Utc>,

  // Carried only on chunk_index == 0; `None` on every other chunk.
  pub original_file_name: Option<String>,
  pub content_type: Option<String>,
  pub file_size_bytes: Option<i64>,
  pub blob_path: Option<String>,
  pub blob_container: Option<String>,
  pub text_content_blob_path: Option<String>,
}

impl DocumentChunk {
  pub fn is_metadata_carrier(&self) -> bool {
    self.chunk_index == 0
  }
}

/// Transient projection returned by the orchestrator; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
  pub id: ChunkId,
  pub document_id: String,
  pub chunk_index: u32,
  pub content: String,
  pub metadata: Option<String>,
  pub created_at: DateTime<Utc>,

  pub original_file_name: Option<String>,
  pub content_type: Option<String>,
  pub file_size_bytes: Option<i64>,
  pub blob_path: Option<String>,
  pub blob_container: Option<String>,
  pub text_content_blob_path: Option<String>,

  /// Combined score, `0.7*vector + 0.3*text`, after any boosts (~[0, 2.5]).
  pub score: f32,
  /// Raw backend vector score before fusion with lexical relevance.
  pub vector_score: f32,
}

impl SearchResult {
  /// Builds a `SearchResult` from a chunk and its already-computed scores,
  /// hydrating per-document fields from `chunk0` when `chunk` itself lacks
  /// them (i.e. `chunk.chunk_index != 0`).
  pub fn from_chunk(chunk: &DocumentChunk, chunk0: Option<&DocumentChunk>, score: f32, vector_score: f32) -> Self {
    let source = if chunk.is_metadata_carrier() { Some(chunk) } else { chunk0 };
    Self {
      id: chunk.id.clone(),
      document_id: chunk.document_id.clone(),
      chunk_index: chunk.chunk_index,
      content: chunk.content.clone(),
      metadata: chunk.metadata.clone(),
      created_at: chunk.created_at,
      original_file_name: chunk.original_file_name.clone().or_else(|| source.and_then(|s| s.original_file_name.clone())),
      content_type: chunk.content_type.clone().or_else(|| source.and_then(|s| s.content_type.clone())),
      file_size_bytes: chunk.file_size_bytes.or_else(|| source.and_then(|s| s.file_size_bytes)),
      blob_path: chunk.blob_path.clone().or_else(|| source.and_then(|s| s.blob_path.clone())),
      blob_container: chunk.blob_container.clone().or_else(|| source.and_then(|s| s.blob_container.clone())),
      text_content_blob_path: chunk
        .text_content_blob_path
        .clone()
        .or_else(|| source.and_then(|s| s.text_content_blob_path.clone())),
      score,
      vector_score,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
  User,
  Assistant,
}

impl fmt::Display for ChatRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ChatRole::User => write!(f, "user"),
      ChatRole::Assistant => write!(f, "assistant"),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatHistoryEntry {
  pub role: ChatRole,
  pub content: String,
}

/// Incoming query, as accepted by `POST /search`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchRequest {
  pub query: String,
  #[serde(default = "default_max_results")]
  pub max_results: u32,
  #[serde(default = "default_true")]
  pub use_semantic_search: bool,
  pub document_id: Option<String>,
  #[serde(default)]
  pub enable_query_expansion: bool,
  #[serde(default = "default_true")]
  pub include_answer: bool,
  #[serde(default)]
  pub chat_history: Vec<ChatHistoryEntry>,
}

fn default_max_results() -> u32 {
  5
}

fn default_true() -> bool {
  true
}

/// Output of the Search Orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
  pub query: String,
  pub expanded_query: Option<String>,
  pub results: Vec<SearchResult>,
  pub generated_answer: Option<String>,
  pub total_results: usize,
  pub success: bool,
  pub message: Option<String>,
}

/// Response of the Ingest Pipeline's upload operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
  pub success: bool,
  pub document_id: Option<String>,
  pub chunks_created: usize,
  pub message: String,
}

/// Per-document summary backing `GET /documents`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentSummary {
  pub document_id: String,
  pub original_file_name: Option<String>,
  pub content_type: Option<String>,
  pub chunk_count: usize,
  pub last_updated: Option<DateTime<Utc>>,
  pub sample_chunks: Vec<String>,
}

pub const NO_INFORMATION_FOUND_MESSAGE: &str =
  "I could not find any relevant information to answer your question. Please try rephrasing it.";
