use axum::{
  extract::{Query, State},
  response::Response,
  Json,
};
use serde::{Deserialize, Serialize};

use crate::{
  delivery::{attachment, sanitize_filename},
  provider::proxy_url,
  video_id::VideoId,
  AppState, Error, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ThumbnailQuality {
  #[serde(rename = "maxresdefault")]
  MaxRes,
  #[serde(rename = "sddefault")]
  Standard,
  #[serde(rename = "hqdefault")]
  High,
  #[serde(rename = "mqdefault")]
  Medium,
  #[serde(rename = "default")]
  Default,
}

impl ThumbnailQuality {
  // the tiny 120x90 `default` rendition is not offered
  pub const OFFERED: [ThumbnailQuality; 4] = [
    ThumbnailQuality::MaxRes,
    ThumbnailQuality::Standard,
    ThumbnailQuality::High,
    ThumbnailQuality::Medium,
  ];

  fn from_key(key: &str) -> Option<Self> {
    Self::OFFERED
      .into_iter()
      .chain([ThumbnailQuality::Default])
      .find(|q| q.key() == key)
  }

  pub fn key(self) -> &'static str {
    match self {
      ThumbnailQuality::MaxRes => "maxresdefault",
      ThumbnailQuality::Standard => "sddefault",
      ThumbnailQuality::High => "hqdefault",
      ThumbnailQuality::Medium => "mqdefault",
      ThumbnailQuality::Default => "default",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      ThumbnailQuality::MaxRes => "4K/Ultra HD",
      ThumbnailQuality::Standard => "Standard Definition",
      ThumbnailQuality::High => "High Quality",
      ThumbnailQuality::Medium => "Medium Quality",
      ThumbnailQuality::Default => "Default",
    }
  }

  pub fn resolution(self) -> &'static str {
    match self {
      ThumbnailQuality::MaxRes => "1920x1080",
      ThumbnailQuality::Standard => "640x480",
      ThumbnailQuality::High => "480x360",
      ThumbnailQuality::Medium => "320x180",
      ThumbnailQuality::Default => "120x90",
    }
  }

  pub fn url(self, video_id: &VideoId) -> String {
    format!("https://i.ytimg.com/vi/{}/{}.jpg", video_id, self.key())
  }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Thumbnail {
  pub key: ThumbnailQuality,
  pub label: &'static str,
  pub resolution: &'static str,
  pub url: String,
}

pub fn catalogue(video_id: &VideoId) -> Vec<Thumbnail> {
  ThumbnailQuality::OFFERED
    .into_iter()
    .map(|q| Thumbnail {
      key: q,
      label: q.label(),
      resolution: q.resolution(),
      url: q.url(video_id),
    })
    .collect()
}

#[derive(Debug, Deserialize)]
pub struct ThumbnailsReq {
  id: Option<String>,
}

pub async fn list_thumbnails(
  Query(req): Query<ThumbnailsReq>,
) -> Result<Json<Vec<Thumbnail>>> {
  let video_id = VideoId::parse(req.id.as_deref().unwrap_or_default())?;
  Ok(Json(catalogue(&video_id)))
}

#[derive(Debug, Deserialize)]
pub struct ThumbnailReq {
  id: Option<String>,
  quality: Option<String>,
  title: Option<String>,
}

fn parse_quality(s: Option<&str>) -> Result<ThumbnailQuality> {
  let Some(s) = s.filter(|s| !s.is_empty()) else {
    return Ok(ThumbnailQuality::MaxRes);
  };

  ThumbnailQuality::from_key(s).ok_or_else(|| {
    Error::InvalidInput(format!("unknown thumbnail quality: {s}"))
  })
}

pub async fn download_thumbnail(
  State(state): State<AppState>,
  Query(req): Query<ThumbnailReq>,
) -> Result<Response> {
  let video_id = VideoId::parse(req.id.as_deref().unwrap_or_default())?;
  let quality = parse_quality(req.quality.as_deref())?;
  let title = req.title.unwrap_or_else(|| video_id.to_string());
  let filename =
    format!("{}_thumbnail_{}.jpg", sanitize_filename(&title), quality.key());

  let upstream = proxy_url(&state.client, &quality.url(&video_id)).await?;
  attachment(upstream, "image/jpeg", &filename)
}
