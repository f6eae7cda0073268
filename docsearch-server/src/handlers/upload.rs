use axum::{extract::Extension, extract::Multipart, Json};
use docsearch_core::model::UploadResponse;

use crate::services::IngestRequest;
use crate::{AppError, AppState};

/// Accepts a multipart upload: a required `file` part, plus optional
/// `documentId`, `metadata`, `chunkSize` and `chunkOverlap` form fields.
#[utoipa::path(
    post,
    path = "/api/upload",
    responses(
        (status = 200, description = "Ingest succeeded", body = UploadResponse),
        (status = 400, description = "Malformed multipart body or invalid file"),
        (status = 409, description = "Requested document id already exists"),
        (status = 500, description = "Processing failure (extraction, embedding, indexing)")
    ),
    tag = "upload"
)]
pub async fn upload_handler(
  Extension(state): Extension<AppState>,
  mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
  let mut file_name: Option<String> = None;
  let mut content_type: Option<String> = None;
  let mut bytes: Option<Vec<u8>> = None;
  let mut desired_document_id: Option<String> = None;
  let mut user_metadata: Option<String> = None;
  let mut chunk_size: Option<usize> = None;
  let mut chunk_overlap: Option<usize> = None;

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| AppError::InvalidInput(format!("malformed multipart body: {e}")))?
  {
    match field.name().unwrap_or_default() {
      "file" => {
        file_name = field.file_name().map(|s| s.to_string());
        content_type = field.content_type().map(|s| s.to_string());
        bytes = Some(
          field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("could not read file part: {e}")))?
            .to_vec(),
        );
      }
      "documentId" => {
        desired_document_id = Some(field.text().await.unwrap_or_default()).filter(|s| !s.is_empty());
      }
      "metadata" => {
        user_metadata = Some(field.text().await.unwrap_or_default()).filter(|s| !s.is_empty());
      }
      "chunkSize" => {
        chunk_size = field.text().await.ok().and_then(|s| s.parse().ok());
      }
      "chunkOverlap" => {
        chunk_overlap = field.text().await.ok().and_then(|s| s.parse().ok());
      }
      _ => {}
    }
  }

  let bytes = bytes.ok_or_else(|| AppError::InvalidInput("multipart body is missing the \"file\" part".to_string()))?;
  let file_name = file_name.unwrap_or_else(|| "upload".to_string());
  let content_type = content_type.unwrap_or_else(|| mime_guess::from_path(&file_name).first_or_octet_stream().to_string());

  let request = IngestRequest {
    file_name,
    content_type,
    bytes,
    desired_document_id,
    user_metadata,
    chunk_size: chunk_size.unwrap_or(state.config.upload.default_chunk_size),
    chunk_overlap: chunk_overlap.unwrap_or(state.config.upload.default_chunk_overlap),
  };

  let response = state.ingest.ingest(request, &state.config.upload).await?;
  Ok(Json(response))
}
