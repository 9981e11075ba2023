use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::{format::StreamRef, video_id::VideoId, Error, Result};

use super::{
  proxy_url, ref_not_found, Provider, RawStreamRecord, StreamKind,
  UpstreamStream,
};

pub const DEFAULT_PIPED_INSTANCE: &str = "https://pipedapi.kavin.rocks";

// extraction through the api of a Piped instance.
pub struct Piped {
  client: reqwest::Client,
  instance: String,
  timeout: std::time::Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipedStreams {
  #[serde(default)]
  video_streams: Vec<PipedStream>,
  #[serde(default)]
  audio_streams: Vec<PipedStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipedStream {
  url: String,
  #[serde(default)]
  quality: String,
  #[serde(default)]
  mime_type: String,
  #[serde(default)]
  video_only: bool,
  #[serde(default)]
  bitrate: u64,
  // -1 when the backend has no itag for the stream
  itag: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PipedError {
  #[serde(alias = "message")]
  error: String,
}

impl PipedStreams {
  fn records(&self) -> Vec<RawStreamRecord> {
    let video = self.video_streams.iter().filter_map(|s| {
      let kind = if s.video_only {
        StreamKind::VideoOnly
      } else {
        StreamKind::Muxed
      };
      s.record(kind, Some(s.quality.clone()))
    });
    let audio = self
      .audio_streams
      .iter()
      .filter_map(|s| s.record(StreamKind::AudioOnly, None));

    video.chain(audio).collect()
  }

  fn find(&self, itag: u64) -> Option<&PipedStream> {
    self
      .video_streams
      .iter()
      .chain(self.audio_streams.iter())
      .find(|s| s.itag() == Some(itag))
  }
}

impl PipedStream {
  fn itag(&self) -> Option<u64> {
    self.itag.and_then(|itag| u64::try_from(itag).ok())
  }

  fn record(
    &self,
    kind: StreamKind,
    quality_label: Option<String>,
  ) -> Option<RawStreamRecord> {
    Some(RawStreamRecord {
      kind,
      quality_label,
      mime_type: self.mime_type.clone(),
      audio_bitrate_kbps: (kind == StreamKind::AudioOnly)
        .then(|| self.bitrate as f64 / 1000.0),
      stream_ref: StreamRef::Itag(self.itag()?),
    })
  }
}

impl Piped {
  pub fn new(
    client: reqwest::Client,
    instance: impl Into<String>,
    timeout: std::time::Duration,
  ) -> Self {
    let instance = instance.into().trim_end_matches('/').to_owned();
    Self {
      client,
      instance,
      timeout,
    }
  }

  pub fn stream_url(&self, video_id: &VideoId) -> String {
    format!("{}/streams/{}", self.instance, video_id)
  }

  async fn streams(&self, video_id: &VideoId) -> Result<PipedStreams> {
    let resp = self
      .client
      .get(self.stream_url(video_id))
      .timeout(self.timeout)
      .send()
      .await
      .map_err(Error::provider)?;

    let status = resp.status();
    let body = resp.bytes().await.map_err(Error::provider)?;
    if status.is_success() {
      return serde_json::from_slice(&body).map_err(Error::provider);
    }

    let message = serde_json::from_slice::<PipedError>(&body)
      .map(|e| e.error)
      .unwrap_or_else(|_| format!("piped responded with {status}"));
    match status {
      StatusCode::NOT_FOUND => Err(Error::NotFound(message)),
      _ => Err(Error::Provider(message)),
    }
  }
}

#[async_trait]
impl Provider for Piped {
  fn name(&self) -> &'static str {
    "piped"
  }

  async fn fetch_raw_streams(
    &self,
    video_id: &VideoId,
  ) -> Result<Vec<RawStreamRecord>> {
    Ok(self.streams(video_id).await?.records())
  }

  async fn open_stream(
    &self,
    video_id: &VideoId,
    stream_ref: &StreamRef,
  ) -> Result<UpstreamStream> {
    let StreamRef::Itag(itag) = stream_ref else {
      return Err(ref_not_found(video_id, stream_ref));
    };

    let streams = self.streams(video_id).await?;
    let stream = streams
      .find(*itag)
      .ok_or_else(|| ref_not_found(video_id, stream_ref))?;
    proxy_url(&self.client, &stream.url).await
  }
}

#[cfg(test)]
mod test {
  use super::*;

  const SAMPLE: &str = r#"{
    "title": "sample",
    "videoStreams": [
      {"url": "https://proxy/v1", "format": "MPEG_4", "quality": "1080p",
       "mimeType": "video/mp4", "videoOnly": true, "bitrate": 4000000,
       "itag": 137},
      {"url": "https://proxy/v2", "format": "MPEG_4", "quality": "360p",
       "mimeType": "video/mp4", "videoOnly": false, "bitrate": 500000,
       "itag": 18},
      {"url": "https://proxy/v3", "quality": "LBRY", "mimeType": "video/mp4",
       "videoOnly": false},
      {"url": "https://proxy/v4", "format": "MPEG_4", "quality": "720p",
       "mimeType": "video/mp4", "videoOnly": true, "itag": -1}
    ],
    "audioStreams": [
      {"url": "https://proxy/a1", "format": "M4A", "quality": "128 kbps",
       "mimeType": "audio/mp4", "bitrate": 129478, "itag": 140}
    ]
  }"#;

  #[test]
  fn test_records() {
    let streams: PipedStreams = serde_json::from_str(SAMPLE).unwrap();
    let records = streams.records();

    // the LBRY stream and the one without an itag are dropped
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].kind, StreamKind::VideoOnly);
    assert_eq!(records[0].quality_label.as_deref(), Some("1080p"));
    assert_eq!(records[0].audio_bitrate_kbps, None);
    assert_eq!(records[1].kind, StreamKind::Muxed);
    assert_eq!(records[2].kind, StreamKind::AudioOnly);
    assert_eq!(records[2].audio_bitrate_kbps, Some(129.478));
    assert_eq!(records[2].stream_ref, StreamRef::Itag(140));
  }

  #[test]
  fn test_find() {
    let streams: PipedStreams = serde_json::from_str(SAMPLE).unwrap();
    assert_eq!(
      streams.find(140).map(|s| s.url.as_str()),
      Some("https://proxy/a1")
    );
    assert!(streams.find(22).is_none());
    assert!(streams.find(u64::MAX).is_none());
  }

  #[test]
  fn test_stream_url() {
    let piped = Piped::new(
      reqwest::Client::new(),
      "https://piped.example/",
      std::time::Duration::from_secs(1),
    );
    let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
    assert_eq!(
      piped.stream_url(&id),
      "https://piped.example/streams/dQw4w9WgXcQ"
    );
  }
}
