mod piped;
mod rustube;
mod ytdlp;

#[cfg(test)]
pub mod fake;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use tracing::debug;

use crate::{format::StreamRef, video_id::VideoId, Error, Result};

pub use self::rustube::Rustube;
pub use piped::{Piped, DEFAULT_PIPED_INSTANCE};
pub use ytdlp::Ytdlp;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
  Muxed,
  VideoOnly,
  AudioOnly,
}

impl StreamKind {
  pub fn from_tracks(has_video: bool, has_audio: bool) -> Option<Self> {
    match (has_video, has_audio) {
      (true, true) => Some(StreamKind::Muxed),
      (true, false) => Some(StreamKind::VideoOnly),
      (false, true) => Some(StreamKind::AudioOnly),
      (false, false) => None,
    }
  }
}

/// One rendition as reported by a provider, before ranking.
#[derive(Clone, Debug)]
pub struct RawStreamRecord {
  pub kind: StreamKind,
  /// "1080p", "720p60"; absent for audio-only streams
  pub quality_label: Option<String>,
  pub mime_type: String,
  pub audio_bitrate_kbps: Option<f64>,
  pub stream_ref: StreamRef,
}

pub struct UpstreamStream {
  pub stream: BoxStream<'static, Result<Bytes>>,
  pub content_length: Option<u64>,
}

#[async_trait]
pub trait Provider: Send + Sync {
  fn name(&self) -> &'static str;

  async fn fetch_raw_streams(
    &self,
    video_id: &VideoId,
  ) -> Result<Vec<RawStreamRecord>>;

  /// Opens the bytes of a rendition previously listed by
  /// `fetch_raw_streams` for the same video. Refs the provider does not
  /// list for the video are rejected with `NotFound`.
  async fn open_stream(
    &self,
    video_id: &VideoId,
    stream_ref: &StreamRef,
  ) -> Result<UpstreamStream>;
}

pub(crate) fn ref_not_found(
  video_id: &VideoId,
  stream_ref: &StreamRef,
) -> Error {
  Error::NotFound(format!("no stream {stream_ref} for video {video_id}"))
}

/// Relays a remote url chunk by chunk. Dropping the returned stream aborts
/// the request.
pub async fn proxy_url(
  client: &reqwest::Client,
  url: &str,
) -> Result<UpstreamStream> {
  let resp = client
    .get(url)
    .send()
    .await
    .map_err(|e| Error::Upstream(e.to_string()))?;

  match resp.status() {
    status if status.is_success() => (),
    StatusCode::NOT_FOUND => {
      return Err(Error::NotFound("stream not found upstream".to_owned()))
    }
    status => {
      return Err(Error::Upstream(format!("upstream responded with {status}")))
    }
  }

  debug!("relaying upstream stream ({:?} bytes)", resp.content_length());

  let content_length = resp.content_length();
  let stream = resp
    .bytes_stream()
    .map_err(|e| Error::Upstream(e.to_string()))
    .boxed();

  Ok(UpstreamStream {
    stream,
    content_length,
  })
}

pub fn http_client(connect_timeout: Duration) -> Result<reqwest::Client> {
  let client = reqwest::Client::builder()
    .connect_timeout(connect_timeout)
    .user_agent("Mozilla/5.0")
    .build()?;
  Ok(client)
}
