use axum::{
  extract::{Query, State},
  http::header,
  response::IntoResponse,
  Json,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
  format::{self, FormatDescriptor},
  provider::Provider,
  video_id::VideoId,
  AppState, Result,
};

/// Validates the input, asks the provider once and ranks what it returns.
pub async fn resolve(
  provider: &dyn Provider,
  input: &str,
) -> Result<Vec<FormatDescriptor>> {
  let video_id = VideoId::parse(input)?;
  resolve_id(provider, &video_id).await
}

pub async fn resolve_id(
  provider: &dyn Provider,
  video_id: &VideoId,
) -> Result<Vec<FormatDescriptor>> {
  let records = provider.fetch_raw_streams(video_id).await.map_err(|e| {
    warn!("{} failed for {}: {}", provider.name(), video_id, e);
    e
  })?;

  let total = records.len();
  let formats = format::rank(records);
  debug!(
    "{}: {} raw streams, {} formats for {}",
    provider.name(),
    total,
    formats.len(),
    video_id
  );

  Ok(formats)
}

#[derive(Debug, Deserialize)]
pub struct FormatsReq {
  id: Option<String>,
}

pub async fn get_formats(
  State(state): State<AppState>,
  Query(req): Query<FormatsReq>,
) -> Result<impl IntoResponse> {
  let input = req.id.unwrap_or_default();
  let formats = resolve(state.provider.as_ref(), &input).await?;

  Ok(([(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(formats)))
}
