//! Ingest Pipeline: validates an uploaded file, persists the original (and,
//! for non-native-text formats, its extracted text) to blob storage, chunks
//! and embeds the content, and indexes it. All-or-nothing: any failure past
//! the blob upload rolls back what was written.

use crate::config::UploadConfig;
use crate::services::{chunking, extraction};
use chrono::Utc;
use docsearch_core::{BlobGateway, BlobMetadata, ChunkId, CoreError, DocumentChunk, Embedder, IndexGateway, UploadResponse};
use std::sync::Arc;
use uuid::Uuid;

const MAX_ID_GENERATION_ATTEMPTS: usize = 5;

pub struct IngestPipeline {
  index: Arc<dyn IndexGateway>,
  blob: Arc<dyn BlobGateway>,
  embedder: Arc<dyn Embedder>,
  container: String,
}

pub struct IngestRequest {
  pub file_name: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
  pub desired_document_id: Option<String>,
  pub user_metadata: Option<String>,
  pub chunk_size: usize,
  pub chunk_overlap: usize,
}

impl IngestPipeline {
  pub fn new(index: Arc<dyn IndexGateway>, blob: Arc<dyn BlobGateway>, embedder: Arc<dyn Embedder>, container: String) -> Self {
    Self {
      index,
      blob,
      embedder,
      container,
    }
  }

  /// Resolves the document id: returns it unchanged if `desired` is absent
  /// or doesn't yet exist, `Conflict` if it already does, or a fresh unique
  /// UUID after up to `MAX_ID_GENERATION_ATTEMPTS` collision checks.
  async fn resolve_document_id(&self, desired: Option<&str>) -> Result<String, CoreError> {
    if let Some(id) = desired {
      return match self.index.document_exists(id).await {
        Ok(true) => Err(CoreError::Conflict(format!("document id \"{id}\" already exists"))),
        Ok(false) => Ok(id.to_string()),
        Err(e) => Err(CoreError::Upstream(format!("could not verify document id: {e}"))),
      };
    }

    for _ in 0..MAX_ID_GENERATION_ATTEMPTS {
      let candidate = Uuid::new_v4().to_string();
      match self.index.document_exists(&candidate).await {
        Ok(false) => return Ok(candidate),
        Ok(true) => continue,
        Err(e) => return Err(CoreError::GenerationFailed(format!("could not generate a unique document id: {e}"))),
      }
    }
    Err(CoreError::GenerationFailed(
      "could not generate a unique document id after several attempts".to_string(),
    ))
  }

  pub async fn ingest(&self, request: IngestRequest, config: &UploadConfig) -> Result<UploadResponse, CoreError> {
    validate_upload(&request.bytes, &request.file_name, config).map_err(CoreError::ValidationFailed)?;

    let document_id = self.resolve_document_id(request.desired_document_id.as_deref()).await?;

    let sanitized_name = docsearch_core::sanitize::sanitize_filename(&request.file_name);
    let original_key = format!("{document_id}_{sanitized_name}");
    let original_file_name_base64 = base64_encode(request.file_name.as_bytes());

    let metadata = BlobMetadata {
      document_id: document_id.clone(),
      original_file_name: sanitized_name.clone(),
      original_file_name_base64,
      uploaded_at: Utc::now(),
      file_size: request.bytes.len() as i64,
    };

    if let Err(e) = self
      .blob
      .upload(&original_key, &request.bytes, &request.content_type, &metadata)
      .await
    {
      return Err(CoreError::Internal(format!("failed to upload original file: {e}")));
    }

    let mut uploaded_keys = vec![original_key.clone()];
    let extracted = extraction::extract(&request.bytes, &request.content_type, &request.file_name);

    let text_content_blob_path = if extracted.is_native_text {
      None
    } else {
      let extracted_key = format!("{original_key}_content.txt");
      if let Err(e) = self
        .blob
        .upload(extracted_key.as_str(), extracted.text.as_bytes(), "text/plain", &metadata)
        .await
      {
        self.rollback_blobs(&uploaded_keys).await;
        return Err(CoreError::Internal(format!("failed to upload extracted text: {e}")));
      }
      uploaded_keys.push(extracted_key.clone());
      Some(extracted_key)
    };

    let pieces = chunking::chunk_text(&extracted.text, request.chunk_size, request.chunk_overlap);
    if pieces.is_empty() {
      self.rollback_blobs(&uploaded_keys).await;
      return Err(CoreError::ValidationFailed("no extractable text content in the uploaded file".to_string()));
    }

    let embeddings = match self.embedder.embed_batch(&pieces).await {
      Ok(vectors) => vectors,
      Err(e) => {
        self.rollback_blobs(&uploaded_keys).await;
        return Err(CoreError::Internal(format!("failed to embed document content: {e}")));
      }
    };

    let now = Utc::now();
    let chunks: Vec<DocumentChunk> = pieces
      .iter()
      .zip(embeddings.into_iter())
      .enumerate()
      .map(|(i, (content, embedding))| DocumentChunk {
        id: ChunkId::new(&document_id, i as u32),
        document_id: document_id.clone(),
        chunk_index: i as u32,
        content: content.clone(),
        embedding,
        metadata: request.user_metadata.clone(),
        created_at: now,
        original_file_name: if i == 0 { Some(request.file_name.clone()) } else { None },
        content_type: if i == 0 { Some(request.content_type.clone()) } else { None },
        file_size_bytes: if i == 0 { Some(request.bytes.len() as i64) } else { None },
        blob_path: if i == 0 { Some(original_key.clone()) } else { None },
        blob_container: if i == 0 { Some(self.container.clone()) } else { None },
        text_content_blob_path: if i == 0 { text_content_blob_path.clone() } else { None },
      })
      .collect();

    let (indexed, failed) = match self.index.index_chunks(&chunks).await {
      Ok(result) => result,
      Err(e) => {
        self.rollback_blobs(&uploaded_keys).await;
        return Err(CoreError::Internal(format!("failed to index document chunks: {e}")));
      }
    };

    if failed > 0 {
      self.rollback_blobs(&uploaded_keys).await;
      let _ = self.index.delete_document(&document_id).await;
      return Err(CoreError::Internal(format!(
        "indexing partially failed ({failed} of {} chunks)",
        chunks.len()
      )));
    }

    for key in &uploaded_keys {
      match self.blob.exists(key).await {
        Ok(true) => {}
        _ => {
          let _ = self.index.delete_document(&document_id).await;
          return Err(CoreError::Internal("required blobs went missing during indexing; rolled back".to_string()));
        }
      }
    }

    Ok(UploadResponse {
      success: true,
      document_id: Some(document_id),
      chunks_created: indexed,
      message: format!("indexed {indexed} chunk(s)"),
    })
  }

  async fn rollback_blobs(&self, keys: &[String]) {
    for key in keys {
      if let Err(e) = self.blob.delete(key).await {
        tracing::warn!(blob_key = %key, error = %e, "failed to roll back uploaded blob");
      }
    }
  }
}

/// Validates file size and extension. Run before any blob is written.
fn validate_upload(bytes: &[u8], file_name: &str, config: &UploadConfig) -> Result<(), String> {
  if bytes.is_empty() {
    return Err("the uploaded file is empty".to_string());
  }

  let max_bytes = config.max_mb * 1024 * 1024;
  if bytes.len() as u64 > max_bytes {
    return Err(format!("file exceeds the maximum allowed size of {}MB", config.max_mb));
  }

  let extension = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
  if !config.allowed_ext.iter().any(|ext| ext.eq_ignore_ascii_case(&extension)) {
    return Err(format!("file extension \".{extension}\" is not allowed"));
  }

  Ok(())
}

fn base64_encode(bytes: &[u8]) -> String {
  use base64::Engine;
  base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(max_mb: u64) -> UploadConfig {
    UploadConfig {
      max_mb,
      allowed_ext: vec!["txt".to_string()],
      default_chunk_size: 300,
      default_chunk_overlap: 20,
    }
  }

  #[test]
  fn rejects_disallowed_extension() {
    assert!(validate_upload(b"x", "evil.exe", &config(10)).is_err());
    assert!(validate_upload(b"x", "notes.txt", &config(10)).is_ok());
  }

  #[test]
  fn rejects_empty_file() {
    assert!(validate_upload(b"", "notes.txt", &config(10)).is_err());
  }

  #[test]
  fn accepts_exactly_the_size_limit_and_rejects_one_byte_more() {
    let config = config(1);
    let max_bytes = 1024 * 1024;
    let at_limit = vec![0u8; max_bytes];
    let over_limit = vec![0u8; max_bytes + 1];
    assert!(validate_upload(&at_limit, "notes.txt", &config).is_ok());
    assert!(validate_upload(&over_limit, "notes.txt", &config).is_err());
  }
}
