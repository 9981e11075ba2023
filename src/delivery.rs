use axum::{
  body::StreamBody,
  extract::{Query, State},
  http::{header, HeaderMap, HeaderValue},
  response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::{
  format::StreamRef, provider::UpstreamStream, video_id::VideoId, AppState,
  Error, Result,
};

const DEFAULT_CONTAINER: &str = "mp4";
const DEFAULT_TITLE: &str = "video";

/// Replaces everything outside `[A-Za-z0-9_.-]` with `_` and lowercases.
pub fn sanitize_filename(title: &str) -> String {
  title
    .chars()
    .map(|c| match c {
      'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '.' | '-' => {
        c.to_ascii_lowercase()
      }
      _ => '_',
    })
    .collect()
}

pub fn content_type_for(container: &str) -> Option<&'static str> {
  let mime = match container.to_ascii_lowercase().as_str() {
    "mp4" => "video/mp4",
    "webm" => "video/webm",
    "mp3" => "audio/mpeg",
    "opus" => "audio/opus",
    "m4a" => "audio/mp4",
    "jpg" | "jpeg" => "image/jpeg",
    _ => return None,
  };
  Some(mime)
}

/// Streams `upstream` back as a file download. Nothing is buffered: chunks
/// are forwarded as the upstream yields them.
pub fn attachment(
  upstream: UpstreamStream,
  content_type: &str,
  filename: &str,
) -> Result<Response> {
  let disposition = format!("attachment; filename=\"{filename}\"");

  let mut headers = HeaderMap::new();
  headers.insert(header::CONTENT_TYPE, header_value(content_type)?);
  headers.insert(header::CONTENT_DISPOSITION, header_value(&disposition)?);
  headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
  if let Some(len) = upstream.content_length {
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
  }

  Ok((headers, StreamBody::new(upstream.stream)).into_response())
}

fn header_value(s: &str) -> Result<HeaderValue> {
  HeaderValue::from_str(s).map_err(|e| Error::InvalidInput(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct DownloadReq {
  id: Option<String>,
  #[serde(rename = "ref", alias = "itag")]
  stream_ref: Option<String>,
  container: Option<String>,
  title: Option<String>,
}

pub async fn download(
  State(state): State<AppState>,
  Query(req): Query<DownloadReq>,
) -> Result<Response> {
  let video_id = VideoId::parse(req.id.as_deref().unwrap_or_default())?;
  let stream_ref = req
    .stream_ref
    .as_deref()
    .and_then(StreamRef::parse)
    .ok_or_else(|| Error::InvalidInput("Itag is required".into()))?;

  let container = req
    .container
    .filter(|c| !c.is_empty())
    .unwrap_or_else(|| DEFAULT_CONTAINER.to_owned())
    .to_ascii_lowercase();
  let content_type = content_type_for(&container).ok_or_else(|| {
    Error::InvalidInput(format!("unsupported container: {container}"))
  })?;

  let title = req
    .title
    .filter(|t| !t.trim().is_empty())
    .unwrap_or_else(|| DEFAULT_TITLE.to_owned());
  let filename = format!("{}.{}", sanitize_filename(&title), container);

  info!(
    "download {} ref {} via {} as {}",
    video_id,
    stream_ref,
    state.provider.name(),
    filename
  );

  let upstream = state.provider.open_stream(&video_id, &stream_ref).await?;
  attachment(upstream, content_type, &filename)
}
