use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{response::IntoResponse, routing::get, Router};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod delivery;
mod error;
mod format;
mod provider;
mod resolver;
mod thumbnail;
mod video_id;
mod video_info;

pub use error::{Error, Result};

use config::Config;
use provider::Provider;

#[derive(Clone)]
pub struct AppState {
  pub provider: Arc<dyn Provider>,
  pub client: reqwest::Client,
  pub timeout: Duration,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let config = Config::from_env()?;
  let client = provider::http_client(config.timeout)?;
  let state = AppState {
    provider: config.build_provider(&client),
    client,
    timeout: config.timeout,
  };
  let app = router(state);
  let listen_addr = config.listen_addr;

  Toplevel::new(move |s| async move {
    s.start(SubsystemBuilder::new("http", move |subsys| {
      serve(subsys, listen_addr, app)
    }));
  })
  .catch_signals()
  .handle_shutdown_requests(Duration::from_secs(10))
  .await?;

  Ok(())
}

fn router(state: AppState) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/formats", get(resolver::get_formats))
    .route("/download", get(delivery::download))
    .route("/video-info", get(video_info::get_video_info))
    .route("/thumbnails", get(thumbnail::list_thumbnails))
    .route("/thumbnail", get(thumbnail::download_thumbnail))
    .with_state(state)
}

async fn serve(
  subsys: SubsystemHandle,
  addr: SocketAddr,
  app: Router,
) -> Result<()> {
  info!("Listening on {}", addr);

  axum::Server::try_bind(&addr)
    .map_err(|e| Error::Server(e.to_string()))?
    .serve(app.into_make_service())
    .with_graceful_shutdown(subsys.on_shutdown_requested())
    .await
    .map_err(|e| Error::Server(e.to_string()))?;

  info!("server stopped");
  Ok(())
}

async fn health() -> impl IntoResponse {
  "ok".to_owned()
}
