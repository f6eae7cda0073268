use axum::extract::{Extension, Path, Query};
use axum::Json;
use docsearch_core::model::DocumentSummary;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{AppError, AppState};

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsParams {
  #[serde(default = "default_max_results")]
  pub max_results: usize,
  #[serde(default)]
  pub skip: usize,
  pub document_id: Option<String>,
}

fn default_max_results() -> usize {
  20
}

#[utoipa::path(
    get,
    path = "/api/documents",
    params(ListDocumentsParams),
    responses((status = 200, description = "Document summaries", body = Vec<DocumentSummary>)),
    tag = "documents"
)]
pub async fn list_documents_handler(
  Extension(state): Extension<AppState>,
  Query(params): Query<ListDocumentsParams>,
) -> Result<Json<Vec<DocumentSummary>>, AppError> {
  let summaries = state
    .index
    .list_documents(params.max_results, params.skip, params.document_id.as_deref())
    .await?;
  Ok(Json(summaries))
}

#[utoipa::path(
    post,
    path = "/api/documents",
    request_body = ListDocumentsParams,
    responses((status = 200, description = "Document summaries", body = Vec<DocumentSummary>)),
    tag = "documents"
)]
pub async fn list_documents_via_body_handler(
  Extension(state): Extension<AppState>,
  Json(params): Json<ListDocumentsParams>,
) -> Result<Json<Vec<DocumentSummary>>, AppError> {
  let summaries = state
    .index
    .list_documents(params.max_results, params.skip, params.document_id.as_deref())
    .await?;
  Ok(Json(summaries))
}

#[utoipa::path(
    get,
    path = "/api/documents/{document_id}",
    responses(
        (status = 200, description = "Document summary", body = DocumentSummary),
        (status = 404, description = "No such document")
    ),
    tag = "documents"
)]
pub async fn get_document_handler(
  Extension(state): Extension<AppState>,
  Path(document_id): Path<String>,
) -> Result<Json<DocumentSummary>, AppError> {
  let mut summaries = state.index.list_documents(1, 0, Some(&document_id)).await?;
  summaries
    .pop()
    .map(Json)
    .ok_or_else(|| AppError::NotFound(format!("document \"{document_id}\" not found")))
}

#[utoipa::path(
    delete,
    path = "/api/documents/{document_id}",
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "No such document")
    ),
    tag = "documents"
)]
pub async fn delete_document_handler(
  Extension(state): Extension<AppState>,
  Path(document_id): Path<String>,
) -> Result<(), AppError> {
  delete_document(&state, &document_id).await
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDocumentRequest {
  pub document_id: String,
}

#[utoipa::path(
    post,
    path = "/api/documents/delete",
    request_body = DeleteDocumentRequest,
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "No such document")
    ),
    tag = "documents"
)]
pub async fn delete_document_via_body_handler(
  Extension(state): Extension<AppState>,
  Json(request): Json<DeleteDocumentRequest>,
) -> Result<(), AppError> {
  delete_document(&state, &request.document_id).await
}

async fn delete_document(state: &AppState, document_id: &str) -> Result<(), AppError> {
  if !state.index.document_exists(document_id).await? {
    return Err(AppError::NotFound(format!("document \"{document_id}\" not found")));
  }

  let chunk0s = state.index.get_chunk0s(std::slice::from_ref(&document_id.to_string())).await?;
  state.index.delete_document(document_id).await?;

  for chunk0 in chunk0s {
    if let Some(blob_path) = &chunk0.blob_path {
      let _ = state.blob.delete(blob_path).await;
    }
    if let Some(text_path) = &chunk0.text_content_blob_path {
      let _ = state.blob.delete(text_path).await;
    }
  }

  Ok(())
}
