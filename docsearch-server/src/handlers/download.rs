use axum::body::Body;
use axum::extract::Extension;
use axum::http::header;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use docsearch_core::CoreError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{AppError, AppState};

const MIN_EXPIRATION_MINUTES: u32 = 1;
const MAX_EXPIRATION_MINUTES: u32 = 60;
const DEFAULT_EXPIRATION_MINUTES: u32 = 15;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MintDownloadTokenRequest {
  pub document_id: String,
  pub expiration_minutes: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MintDownloadTokenResponse {
  pub token: String,
  pub expires_at: DateTime<Utc>,
}

#[utoipa::path(
    post,
    path = "/api/download/token",
    request_body = MintDownloadTokenRequest,
    responses(
        (status = 200, description = "Token minted", body = MintDownloadTokenResponse),
        (status = 404, description = "No such document")
    ),
    tag = "download"
)]
pub async fn mint_download_token_handler(
  Extension(state): Extension<AppState>,
  Json(request): Json<MintDownloadTokenRequest>,
) -> Result<Json<MintDownloadTokenResponse>, AppError> {
  if !state.index.document_exists(&request.document_id).await? {
    return Err(AppError::NotFound(format!("document \"{}\" not found", request.document_id)));
  }

  let expiration_minutes = request
    .expiration_minutes
    .unwrap_or(DEFAULT_EXPIRATION_MINUTES)
    .clamp(MIN_EXPIRATION_MINUTES, MAX_EXPIRATION_MINUTES);

  let (token, expires_at) = state.download_tokens.mint(&request.document_id, expiration_minutes)?;
  Ok(Json(MintDownloadTokenResponse { token, expires_at }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadFileRequest {
  pub token: String,
}

#[utoipa::path(
    post,
    path = "/api/download/file",
    request_body = DownloadFileRequest,
    responses(
        (status = 200, description = "File bytes"),
        (status = 401, description = "Invalid token"),
        (status = 410, description = "Expired token"),
        (status = 404, description = "No such document")
    ),
    tag = "download"
)]
pub async fn download_file_handler(
  Extension(state): Extension<AppState>,
  Json(request): Json<DownloadFileRequest>,
) -> Result<Response, AppError> {
  let document_id = state.download_tokens.verify(&request.token).map_err(|e| match e {
    CoreError::NotFound(_) => AppError::TokenExpired,
    other => AppError::Unauthorized(other.to_string()),
  })?;

  let chunk0 = state
    .index
    .get_chunk0s(std::slice::from_ref(&document_id))
    .await?
    .into_iter()
    .next()
    .ok_or_else(|| AppError::NotFound(format!("document \"{document_id}\" not found")))?;

  let blob_path = chunk0
    .blob_path
    .ok_or_else(|| AppError::NotFound(format!("document \"{document_id}\" has no stored original")))?;
  let bytes = state.blob.download(&blob_path).await?;

  let content_type = chunk0.content_type.unwrap_or_else(|| "application/octet-stream".to_string());
  let file_name = chunk0.original_file_name.unwrap_or_else(|| document_id.clone());

  Ok(
    Response::builder()
      .header(header::CONTENT_TYPE, content_type)
      .header(header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\""))
      .body(Body::from(bytes))
      .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
  )
}
