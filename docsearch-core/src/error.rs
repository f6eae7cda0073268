//! Domain-level error taxonomy and the bridge into transport-level errors.

use thiserror::Error;

/// Abstract error kinds shared by every component boundary in the core.
///
/// Validation and Conflict are meant to reach the caller as 4xx; Upstream,
/// Timeout and Transient are meant to degrade gracefully (the orchestrator
/// turns them into a failed `SearchResponse`, never a panic).
#[derive(Error, Debug)]
pub enum CoreError {
  #[error("validation failed: {0}")]
  ValidationFailed(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("could not generate a unique identifier: {0}")]
  GenerationFailed(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("upstream error: {0}")]
  Upstream(String),

  #[error("deadline exceeded: {0}")]
  Timeout(String),

  #[error("transient upstream failure: {0}")]
  Transient(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl CoreError {
  /// Transient and Timeout are the only kinds worth retrying.
  pub fn is_retryable(&self) -> bool {
    matches!(self, CoreError::Transient(_) | CoreError::Timeout(_))
  }
}

impl From<anyhow::Error> for CoreError {
  fn from(err: anyhow::Error) -> Self {
    CoreError::Upstream(err.to_string())
  }
}

impl From<sqlx::Error> for CoreError {
  fn from(err: sqlx::Error) -> Self {
    match &err {
      sqlx::Error::RowNotFound => CoreError::NotFound("row not found".to_string()),
      _ => CoreError::Upstream(err.to_string()),
    }
  }
}

impl From<jsonwebtoken::errors::Error> for CoreError {
  fn from(err: jsonwebtoken::errors::Error) -> Self {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
      ErrorKind::ExpiredSignature => CoreError::NotFound("token expired".to_string()),
      _ => CoreError::ValidationFailed(format!("invalid token: {err}")),
    }
  }
}

impl From<reqwest::Error> for CoreError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      CoreError::Timeout(err.to_string())
    } else {
      CoreError::Upstream(err.to_string())
    }
  }
}

impl From<tokio::time::error::Elapsed> for CoreError {
  fn from(err: tokio::time::error::Elapsed) -> Self {
    CoreError::Timeout(err.to_string())
  }
}

/// Bridges a `CoreError` into a transport-specific error type (the HTTP
/// layer's `AppError`, for instance) without the core crate depending on
/// that type.
pub trait ErrorMapper {
  type Error;
  fn map_error(error: CoreError) -> Self::Error;
}
