//! Blob Gateway: local-disk object storage keyed by `<uuid>_<sanitized-name>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docsearch_core::{BlobGateway, BlobMetadata, CoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
  document_id: String,
  original_file_name: String,
  original_file_name_base64: String,
  uploaded_at: DateTime<Utc>,
  file_size: i64,
}

impl From<&BlobMetadata> for MetadataFile {
  fn from(m: &BlobMetadata) -> Self {
    Self {
      document_id: m.document_id.clone(),
      original_file_name: m.original_file_name.clone(),
      original_file_name_base64: m.original_file_name_base64.clone(),
      uploaded_at: m.uploaded_at,
      file_size: m.file_size,
    }
  }
}

/// Local-disk `BlobGateway`. Objects live flat under `base_dir`; each object
/// `<key>` has a sidecar `<key>.meta.json` carrying upload metadata.
pub struct LocalBlobGateway {
  base_dir: PathBuf,
}

impl LocalBlobGateway {
  pub fn new(base_dir: impl Into<PathBuf>) -> Self {
    Self {
      base_dir: base_dir.into(),
    }
  }

  fn object_path(&self, key: &str) -> PathBuf {
    self.base_dir.join(key)
  }

  fn meta_path(&self, key: &str) -> PathBuf {
    self.base_dir.join(format!("{key}.meta.json"))
  }

  fn reject_traversal(key: &str) -> Result<(), CoreError> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
      return Err(CoreError::ValidationFailed(format!("invalid blob key: {key}")));
    }
    Ok(())
  }
}

#[async_trait]
impl BlobGateway for LocalBlobGateway {
  async fn upload(&self, key: &str, bytes: &[u8], _content_type: &str, metadata: &BlobMetadata) -> Result<String, CoreError> {
    Self::reject_traversal(key)?;
    fs::create_dir_all(&self.base_dir)
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;

    let object_path = self.object_path(key);
    let mut file = fs::File::create(&object_path)
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;
    file
      .write_all(bytes)
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;

    let meta = MetadataFile::from(metadata);
    let meta_json = serde_json::to_vec_pretty(&meta).map_err(|e| CoreError::Internal(e.to_string()))?;
    fs::write(self.meta_path(key), meta_json)
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;

    Ok(key.to_string())
  }

  async fn download(&self, key: &str) -> Result<Vec<u8>, CoreError> {
    Self::reject_traversal(key)?;
    let path = self.object_path(key);
    fs::read(&path).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        CoreError::NotFound(format!("blob not found: {key}"))
      } else {
        CoreError::Internal(e.to_string())
      }
    })
  }

  async fn delete(&self, key: &str) -> Result<(), CoreError> {
    Self::reject_traversal(key)?;
    let path = self.object_path(key);
    match fs::remove_file(&path).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(CoreError::Internal(e.to_string())),
    }
    let _ = fs::remove_file(self.meta_path(key)).await;
    Ok(())
  }

  async fn exists(&self, key: &str) -> Result<bool, CoreError> {
    Self::reject_traversal(key)?;
    Ok(Path::new(&self.object_path(key)).exists())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_metadata() -> BlobMetadata {
    BlobMetadata {
      document_id: "doc-1".to_string(),
      original_file_name: "notes.txt".to_string(),
      original_file_name_base64: "bm90ZXMudHh0".to_string(),
      uploaded_at: Utc::now(),
      file_size: 5,
    }
  }

  #[tokio::test]
  async fn round_trips_an_object() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = LocalBlobGateway::new(dir.path());
    let key = "11111111-1111-1111-1111-111111111111_notes.txt";

    gateway.upload(key, b"hello", "text/plain", &sample_metadata()).await.unwrap();
    assert!(gateway.exists(key).await.unwrap());
    assert_eq!(gateway.download(key).await.unwrap(), b"hello");

    gateway.delete(key).await.unwrap();
    assert!(!gateway.exists(key).await.unwrap());
  }

  #[tokio::test]
  async fn download_of_missing_key_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = LocalBlobGateway::new(dir.path());
    let err = gateway.download("missing_key.txt").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
  }

  #[tokio::test]
  async fn rejects_path_traversal_keys() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = LocalBlobGateway::new(dir.path());
    let err = gateway.download("../etc/passwd").await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed(_)));
  }
}
