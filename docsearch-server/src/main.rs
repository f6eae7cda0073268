//! Entry point: loads configuration, wires the composition root, and serves.

use docsearch_server::{get_router, AppConfig, AppError, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
  let config = AppConfig::load().expect("failed to load configuration");

  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer())
    .with(tracing_subscriber::EnvFilter::new(&config.server.log_level))
    .init();

  let app_state = AppState::try_new(config.clone()).await?;
  let app = get_router(app_state);

  let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
  info!("listening on {addr}");

  let listener = TcpListener::bind(addr).await?;
  axum::serve(listener, app.into_make_service()).await?;

  Ok(())
}
