//! OpenAPI schema aggregation and doc-UI routes (Swagger UI, Redoc, RapiDoc).

use crate::error::ErrorOutput;
use crate::handlers::{documents, download, health, search, upload};
use axum::{response::Html, response::Json, routing::get, Router};
use docsearch_core::model::{
  ChatHistoryEntry, ChatRole, DocumentSummary, SearchRequest, SearchResponse, SearchResult, UploadResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        search::search_handler,
        upload::upload_handler,
        documents::list_documents_handler,
        documents::list_documents_via_body_handler,
        documents::get_document_handler,
        documents::delete_document_handler,
        documents::delete_document_via_body_handler,
        download::mint_download_token_handler,
        download::download_file_handler,
        health::health_check,
        health::simple_health_check,
    ),
    components(schemas(
        ErrorOutput,
        SearchRequest,
        SearchResponse,
        SearchResult,
        ChatHistoryEntry,
        ChatRole,
        UploadResponse,
        DocumentSummary,
        documents::ListDocumentsParams,
        documents::DeleteDocumentRequest,
        download::MintDownloadTokenRequest,
        download::MintDownloadTokenResponse,
        download::DownloadFileRequest,
        health::SystemHealth,
        health::ServiceHealth,
        health::HealthStatus,
    )),
    tags(
        (name = "search", description = "Hybrid search and answer composition"),
        (name = "upload", description = "Document ingest"),
        (name = "documents", description = "Document metadata and deletion"),
        (name = "download", description = "Scoped download tokens and file retrieval"),
        (name = "health", description = "Liveness and readiness"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
  Json(ApiDoc::openapi())
}

async fn swagger_ui() -> Html<&'static str> {
  Html(
    r#"<!DOCTYPE html>
<html>
<head>
  <title>docsearch API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.1.0/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5.1.0/swagger-ui-bundle.js"></script>
  <script>
    SwaggerUIBundle({ url: '/api-docs/openapi.json', dom_id: '#swagger-ui' });
  </script>
</body>
</html>"#,
  )
}

async fn redoc_ui() -> Html<&'static str> {
  Html(
    r#"<!DOCTYPE html>
<html>
<head><title>docsearch API - Redoc</title><meta charset="utf-8"/></head>
<body>
  <redoc spec-url="/api-docs/openapi.json"></redoc>
  <script src="https://cdn.jsdelivr.net/npm/redoc@2.1.3/bundles/redoc.standalone.js"></script>
</body>
</html>"#,
  )
}

/// Doc-UI routes, merged into the main router by `get_router`.
pub fn router() -> Router {
  Router::new()
    .route("/api-docs/openapi.json", get(openapi_json))
    .route("/swagger-ui", get(swagger_ui))
    .route("/swagger-ui/", get(swagger_ui))
    .route("/redoc", get(redoc_ui))
}
