use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use crate::{format::StreamRef, video_id::VideoId, Error, Result};

use super::{ref_not_found, Provider, RawStreamRecord, UpstreamStream};

/// In-memory provider serving a fixed stream list.
#[derive(Default)]
pub struct FakeProvider {
  pub records: Vec<RawStreamRecord>,
  pub failure: Option<String>,
  pub body: Vec<&'static [u8]>,
  pub calls: AtomicUsize,
}

impl FakeProvider {
  pub fn with_records(records: Vec<RawStreamRecord>) -> Self {
    Self {
      records,
      ..Default::default()
    }
  }

  pub fn failing(message: &str) -> Self {
    Self {
      failure: Some(message.to_owned()),
      ..Default::default()
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Provider for FakeProvider {
  fn name(&self) -> &'static str {
    "fake"
  }

  async fn fetch_raw_streams(
    &self,
    _video_id: &VideoId,
  ) -> Result<Vec<RawStreamRecord>> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    match &self.failure {
      Some(message) => Err(Error::Provider(message.clone())),
      None => Ok(self.records.clone()),
    }
  }

  async fn open_stream(
    &self,
    video_id: &VideoId,
    stream_ref: &StreamRef,
  ) -> Result<UpstreamStream> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(message) = &self.failure {
      return Err(Error::Upstream(message.clone()));
    }
    if !self.records.iter().any(|r| &r.stream_ref == stream_ref) {
      return Err(ref_not_found(video_id, stream_ref));
    }

    let content_length = self.body.iter().map(|b| b.len() as u64).sum();
    let chunks: Vec<Result<Bytes>> = self
      .body
      .iter()
      .map(|b| Ok(Bytes::from_static(*b)))
      .collect();

    Ok(UpstreamStream {
      stream: futures::stream::iter(chunks).boxed(),
      content_length: Some(content_length),
    })
  }
}
