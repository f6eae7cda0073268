use async_trait::async_trait;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SystemHealth {
  pub status: HealthStatus,
  pub services: Vec<ServiceHealth>,
  pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceHealth {
  pub name: String,
  pub status: HealthStatus,
  pub latency_ms: Option<u64>,
  pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
  Healthy,
  Degraded,
  Unhealthy,
}

#[async_trait]
pub trait HealthChecker: Send + Sync {
  async fn check_health(&self) -> ServiceHealth;
  fn service_name(&self) -> &'static str;
}

pub struct DatabaseChecker {
  pool: sqlx::PgPool,
}

impl DatabaseChecker {
  pub fn new(pool: sqlx::PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl HealthChecker for DatabaseChecker {
  async fn check_health(&self) -> ServiceHealth {
    let start = Instant::now();
    match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
      Ok(_) => ServiceHealth {
        name: self.service_name().to_string(),
        status: HealthStatus::Healthy,
        latency_ms: Some(start.elapsed().as_millis() as u64),
        error: None,
      },
      Err(e) => {
        error!("database health check failed: {e}");
        ServiceHealth {
          name: self.service_name().to_string(),
          status: HealthStatus::Unhealthy,
          latency_ms: Some(start.elapsed().as_millis() as u64),
          error: Some(e.to_string()),
        }
      }
    }
  }

  fn service_name(&self) -> &'static str {
    "postgres"
  }
}

/// Checks that the Meilisearch keyword index is reachable.
pub struct SearchChecker {
  client: meilisearch_sdk::client::Client,
}

impl SearchChecker {
  pub fn new(client: meilisearch_sdk::client::Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl HealthChecker for SearchChecker {
  async fn check_health(&self) -> ServiceHealth {
    let start = Instant::now();
    match self.client.health().await {
      Ok(_) => ServiceHealth {
        name: self.service_name().to_string(),
        status: HealthStatus::Healthy,
        latency_ms: Some(start.elapsed().as_millis() as u64),
        error: None,
      },
      Err(e) => {
        error!("meilisearch health check failed: {e}");
        ServiceHealth {
          name: self.service_name().to_string(),
          status: HealthStatus::Unhealthy,
          latency_ms: Some(start.elapsed().as_millis() as u64),
          error: Some(e.to_string()),
        }
      }
    }
  }

  fn service_name(&self) -> &'static str {
    "meilisearch"
  }
}

impl SystemHealth {
  pub fn new(services: Vec<ServiceHealth>) -> Self {
    let status = Self::calculate_overall_status(&services);
    Self {
      status,
      services,
      timestamp: chrono::Utc::now(),
    }
  }

  fn calculate_overall_status(services: &[ServiceHealth]) -> HealthStatus {
    if services.iter().any(|s| s.status == HealthStatus::Unhealthy) {
      HealthStatus::Unhealthy
    } else if services.iter().any(|s| s.status == HealthStatus::Degraded) {
      HealthStatus::Degraded
    } else {
      HealthStatus::Healthy
    }
  }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System healthy or degraded", body = SystemHealth),
        (status = 503, description = "System unhealthy", body = SystemHealth)
    ),
    tag = "health"
)]
pub async fn health_check(Extension(state): Extension<AppState>) -> impl IntoResponse {
  info!("health check requested");

  let checkers: Vec<Box<dyn HealthChecker>> = vec![
    Box::new(DatabaseChecker::new(state.pg_pool.clone())),
    Box::new(SearchChecker::new(meilisearch_sdk::client::Client::new(
      &state.config.index.meilisearch_url,
      Some(&state.config.index.meilisearch_api_key),
    )
    .expect("meilisearch client config was already validated at startup"))),
  ];

  let mut services = Vec::with_capacity(checkers.len());
  for checker in checkers {
    services.push(checker.check_health().await);
  }

  let system_health = SystemHealth::new(services);
  let status_code = match system_health.status {
    HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
  };

  (status_code, Json(system_health))
}

#[utoipa::path(
    get,
    path = "/health/readiness",
    responses(
        (status = 200, description = "Database reachable"),
        (status = 503, description = "Database unreachable")
    ),
    tag = "health"
)]
pub async fn simple_health_check(Extension(state): Extension<AppState>) -> impl IntoResponse {
  match sqlx::query("SELECT 1").fetch_one(&state.pg_pool).await {
    Ok(_) => StatusCode::OK,
    Err(_) => StatusCode::SERVICE_UNAVAILABLE,
  }
}
