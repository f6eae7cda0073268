use axum::{extract::Extension, Json};
use docsearch_core::model::{SearchRequest, SearchResponse};

use crate::{AppError, AppState};

/// Runs the hybrid search pipeline and, when requested, composes a grounded
/// answer over the retrieved sources.
#[utoipa::path(
    post,
    path = "/api/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search completed (see `success`/`message` for upstream/timeout degradation)", body = SearchResponse),
        (status = 400, description = "Empty query or maxResults outside [1, 50]"),
        (status = 500, description = "Unexpected internal failure")
    ),
    tag = "search"
)]
pub async fn search_handler(
  Extension(state): Extension<AppState>,
  Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
  let response = state.orchestrator.search(&request).await?;
  Ok(Json(response))
}
