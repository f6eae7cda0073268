//! Core public API: `AppState` composition and router assembly.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middlewares;
pub mod openapi;
pub mod services;

use axum::{
  routing::{get, post},
  Router,
};
use docsearch_ai::{AiAdapter, OllamaAdapter, OpenaiAdapter};
use docsearch_core::{BlobGateway, ChatGateway, DownloadTokenManager, Embedder, IndexGateway};
use std::{fmt, ops::Deref, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub use config::{AppConfig, ChatProvider};
pub use error::{AppError, ErrorOutput};
use services::{FusedIndexGateway, IngestPipeline, LlmChatGateway, LocalBlobGateway, SearchOrchestrator};

/// Application state. Cheaply `Clone`-able; every field behind it is an
/// `Arc`, so cloning just bumps refcounts.
#[derive(Clone)]
pub struct AppState {
  inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
  pub config: AppConfig,
  pub index: Arc<dyn IndexGateway>,
  pub blob: Arc<dyn BlobGateway>,
  pub embedder: Arc<dyn Embedder>,
  pub chat: Arc<dyn ChatGateway>,
  pub orchestrator: SearchOrchestrator,
  pub ingest: IngestPipeline,
  pub download_tokens: DownloadTokenManager,
  /// Kept alongside `index` for health checks; the trait object doesn't
  /// expose the underlying connection pool.
  pub pg_pool: sqlx::PgPool,
}

impl fmt::Debug for AppStateInner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "AppStateInner {{ config: {:?} }}", self.config)
  }
}

impl Deref for AppState {
  type Target = AppStateInner;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl AppState {
  /// Builds the production `AppState`: connects to Postgres and
  /// Meilisearch, constructs the AI adapter, and wires every service.
  pub async fn try_new(config: AppConfig) -> Result<Self, AppError> {
    let pool = sqlx::PgPool::connect(&config.server.db_url)
      .await
      .map_err(|e| AppError::Upstream(format!("failed to connect to postgres: {e}")))?;

    let meili = meilisearch_sdk::client::Client::new(&config.index.meilisearch_url, Some(&config.index.meilisearch_api_key))
      .map_err(|e| AppError::Upstream(format!("failed to build meilisearch client: {e}")))?;

    let pg_pool = pool.clone();
    let index: Arc<dyn IndexGateway> = Arc::new(FusedIndexGateway::new(pool, meili, &config.index.index_name));
    index
      .initialize(
        &[],
        docsearch_core::HnswParams {
          m: config.index.hnsw.m,
          ef_construction: config.index.hnsw.ef_construction,
          ef_search: config.index.hnsw.ef_search,
        },
      )
      .await
      .map_err(AppError::from)?;

    let blob: Arc<dyn BlobGateway> = Arc::new(LocalBlobGateway::new(config.blob.base_dir.clone()));

    let ai_adapter = Arc::new(build_ai_adapter(&config.chat)?);
    let embedder: Arc<dyn Embedder> = Arc::new(services::CachingEmbedder::new(ai_adapter.clone(), config.chat.embedding_dim));
    let chat: Arc<dyn ChatGateway> = Arc::new(LlmChatGateway::new(ai_adapter, blob.clone()));

    let orchestrator = SearchOrchestrator::new(index.clone(), embedder.clone(), chat.clone())
      .with_answer_thresholds(config.index.min_score_for_answer, config.index.max_sources_for_answer);
    let ingest = IngestPipeline::new(index.clone(), blob.clone(), embedder.clone(), config.blob.container.clone());
    let download_tokens = DownloadTokenManager::from_secret(&config.server.download_token_secret);

    Ok(Self {
      inner: Arc::new(AppStateInner {
        config,
        index,
        blob,
        embedder,
        chat,
        orchestrator,
        ingest,
        download_tokens,
        pg_pool,
      }),
    })
  }
}

fn build_ai_adapter(chat: &config::ChatConfig) -> Result<AiAdapter, AppError> {
  match chat.provider {
    ChatProvider::Openai => {
      let api_key = chat
        .openai_api_key
        .clone()
        .ok_or_else(|| AppError::InvalidInput("chat.openaiApiKey is required for provider=openai".to_string()))?;
      Ok(AiAdapter::Openai(
        OpenaiAdapter::new(api_key, chat.chat_model.clone()).with_embedding_model(chat.embedding_model.clone()),
      ))
    }
    ChatProvider::Ollama => {
      let host = chat.ollama_host.clone().unwrap_or_else(|| "http://localhost:11434".to_string());
      Ok(AiAdapter::Ollama(OllamaAdapter::new(host, chat.chat_model.clone())))
    }
  }
}

/// Assembles the HTTP router. Every handler reads `AppState` via
/// `Extension`, not `State`, matching the rest of this surface.
pub fn get_router(state: AppState) -> Router {
  let api_routes = Router::new()
    .route("/upload", post(handlers::upload::upload_handler))
    .route("/search", post(handlers::search::search_handler))
    .route(
      "/documents",
      get(handlers::documents::list_documents_handler).post(handlers::documents::list_documents_via_body_handler),
    )
    .route(
      "/documents/{document_id}",
      get(handlers::documents::get_document_handler).delete(handlers::documents::delete_document_handler),
    )
    .route("/documents/delete", post(handlers::documents::delete_document_via_body_handler))
    .route("/download/token", post(handlers::download::mint_download_token_handler))
    .route("/download/file", post(handlers::download::download_file_handler));

  let health_routes = Router::new()
    .route("/health", get(handlers::health::health_check))
    .route("/health/readiness", get(handlers::health::simple_health_check));

  Router::new()
    .nest("/api", api_routes)
    .merge(health_routes)
    .merge(openapi::router())
    .layer(axum::middleware::from_fn(middlewares::request_id_middleware))
    .layer(middlewares::ServerTimeLayer)
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .layer(axum::Extension(state))
}

#[allow(dead_code)]
fn log_startup(config: &AppConfig) {
  info!(port = config.server.port, "starting docsearch-server");
}
