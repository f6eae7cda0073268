use axum::http::StatusCode;
use axum::response::Json;
use axum::{
  body::Body,
  response::{IntoResponse, Response},
};
use docsearch_core::error::{CoreError, ErrorMapper};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOutput {
  pub code: u16,
  pub error: String,
}

impl ErrorOutput {
  pub fn new(error: impl Into<String>) -> Self {
    Self {
      code: StatusCode::BAD_REQUEST.as_u16(),
      error: error.into(),
    }
  }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("could not generate a unique identifier: {0}")]
  GenerationFailed(String),

  #[error("upstream error: {0}")]
  Upstream(String),

  #[error("deadline exceeded: {0}")]
  Timeout(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("download token expired")]
  TokenExpired,

  #[error("io error: {0}")]
  IoError(std::io::Error),

  #[error("internal error: {0}")]
  Internal(anyhow::Error),
}

impl ErrorMapper for AppError {
  type Error = AppError;

  fn map_error(error: CoreError) -> Self::Error {
    match error {
      CoreError::ValidationFailed(e) => AppError::InvalidInput(e),
      CoreError::Conflict(e) => AppError::Conflict(e),
      CoreError::GenerationFailed(e) => AppError::GenerationFailed(e),
      CoreError::NotFound(e) => AppError::NotFound(e),
      CoreError::Upstream(e) => AppError::Upstream(e),
      CoreError::Timeout(e) => AppError::Timeout(e),
      CoreError::Transient(e) => AppError::Upstream(e),
      CoreError::Internal(e) => AppError::Internal(anyhow::anyhow!(e)),
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response<Body> {
    let status = match &self {
      AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::GenerationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
      AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      AppError::TokenExpired => StatusCode::GONE,
      AppError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let code = status.as_u16();
    let body = Json(ErrorOutput {
      code,
      error: self.to_string(),
    });
    (status, body).into_response()
  }
}

impl From<std::io::Error> for AppError {
  fn from(error: std::io::Error) -> Self {
    Self::IoError(error)
  }
}

impl From<anyhow::Error> for AppError {
  fn from(error: anyhow::Error) -> Self {
    Self::Internal(error)
  }
}

impl From<CoreError> for AppError {
  fn from(error: CoreError) -> Self {
    Self::map_error(error)
  }
}
