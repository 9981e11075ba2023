use axum::{
  extract::{Query, State},
  Json,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{video_id::VideoId, AppState, Error, Result};

const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";
const UNKNOWN: &str = "N/A";

/// Title and author as reported by oEmbed, no extraction involved.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct VideoInfo {
  pub title: String,
  pub author_name: String,
  pub thumbnail_url: String,
}

#[derive(Debug, Deserialize)]
struct OEmbedResp {
  title: Option<String>,
  author_name: Option<String>,
  thumbnail_url: Option<String>,
}

impl From<OEmbedResp> for VideoInfo {
  fn from(resp: OEmbedResp) -> Self {
    let or_unknown =
      |s: Option<String>| s.filter(|s| !s.is_empty()).unwrap_or(UNKNOWN.into());

    Self {
      title: or_unknown(resp.title),
      author_name: or_unknown(resp.author_name),
      thumbnail_url: resp.thumbnail_url.unwrap_or_default(),
    }
  }
}

pub async fn fetch(
  client: &reqwest::Client,
  timeout: std::time::Duration,
  video_id: &VideoId,
) -> Result<VideoInfo> {
  let watch_url = video_id.watch_url();
  let resp = client
    .get(OEMBED_ENDPOINT)
    .query(&[("format", "json"), ("url", watch_url.as_str())])
    .timeout(timeout)
    .send()
    .await
    .map_err(Error::provider)?;

  match resp.status() {
    status if status.is_success() => (),
    // private and embed-disabled videos answer 401
    StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => {
      return Err(Error::NotFound(format!("video {video_id} not available")))
    }
    status => {
      return Err(Error::Provider(format!("oembed responded with {status}")))
    }
  }

  let resp: OEmbedResp = resp.json().await.map_err(Error::provider)?;
  Ok(resp.into())
}

#[derive(Debug, Deserialize)]
pub struct VideoInfoReq {
  id: Option<String>,
}

pub async fn get_video_info(
  State(state): State<AppState>,
  Query(req): Query<VideoInfoReq>,
) -> Result<Json<VideoInfo>> {
  let video_id = VideoId::parse(req.id.as_deref().unwrap_or_default())?;
  let info = fetch(&state.client, state.timeout, &video_id).await?;
  Ok(Json(info))
}
