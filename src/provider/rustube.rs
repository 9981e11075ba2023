use std::time::Duration;

use async_trait::async_trait;

use crate::{format::StreamRef, video_id::VideoId, Error, Result};

use super::{
  proxy_url, ref_not_found, Provider, RawStreamRecord, StreamKind,
  UpstreamStream,
};

// in-process extraction, no external executable needed.
pub struct Rustube {
  client: reqwest::Client,
  timeout: Duration,
}

impl Rustube {
  pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
    Self { client, timeout }
  }

  async fn fetch_video(&self, video_id: &VideoId) -> Result<rustube::Video> {
    use rustube::{Id, VideoFetcher};

    let id = Id::from_str(video_id.as_str())
      .map_err(Error::provider)?
      .as_owned();
    let fetcher = VideoFetcher::from_id(id).map_err(Error::provider)?;
    let video_info = tokio::time::timeout(self.timeout, fetcher.fetch())
      .await
      .map_err(|_| Error::Provider(format!("timed out fetching {video_id}")))?
      .map_err(Error::provider)?;

    video_info.descramble().map_err(Error::provider)
  }
}

fn to_record(stream: &rustube::Stream) -> Option<RawStreamRecord> {
  let kind = StreamKind::from_tracks(
    stream.includes_video_track,
    stream.includes_audio_track,
  )?;
  let quality_label = match kind {
    StreamKind::AudioOnly => None,
    _ => stream.height.map(|h| format!("{h}p")),
  };

  Some(RawStreamRecord {
    kind,
    quality_label,
    mime_type: stream.mime.to_string(),
    audio_bitrate_kbps: stream.bitrate.map(|bps| bps as f64 / 1000.0),
    stream_ref: StreamRef::Itag(stream.itag),
  })
}

#[async_trait]
impl Provider for Rustube {
  fn name(&self) -> &'static str {
    "rustube"
  }

  async fn fetch_raw_streams(
    &self,
    video_id: &VideoId,
  ) -> Result<Vec<RawStreamRecord>> {
    let video = self.fetch_video(video_id).await?;
    Ok(video.streams().iter().filter_map(to_record).collect())
  }

  async fn open_stream(
    &self,
    video_id: &VideoId,
    stream_ref: &StreamRef,
  ) -> Result<UpstreamStream> {
    let StreamRef::Itag(itag) = stream_ref else {
      return Err(ref_not_found(video_id, stream_ref));
    };

    let video = self.fetch_video(video_id).await?;
    let stream = video
      .streams()
      .iter()
      .find(|s| s.itag == *itag)
      .ok_or_else(|| ref_not_found(video_id, stream_ref))?;

    // without an explicit range the googlevideo host throttles the
    // transfer to playback speed.
    let url = format!("{}&range=0-999999999999", stream.signature_cipher.url);
    proxy_url(&self.client, &url).await
  }
}
