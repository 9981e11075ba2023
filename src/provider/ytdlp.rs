use std::{process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio::{io::AsyncReadExt, process::Command, sync::Semaphore};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::{format::StreamRef, video_id::VideoId, Error, Result};

use super::{
  ref_not_found, Provider, RawStreamRecord, StreamKind, UpstreamStream,
};

// runs the yt-dlp command line for both metadata and bytes.
pub struct Ytdlp {
  program: String,
  program_args: Vec<String>,
  proxy: Option<String>,
  // bounds `-j` runs and the wait for the first downloaded chunk
  timeout: Duration,
  // metadata extractions and running downloads are limited separately so a
  // long download never blocks `/formats`
  extractions: Semaphore,
  downloads: Arc<Semaphore>,
}

#[derive(Deserialize, Debug)]
struct YtdlpOutput {
  #[serde(default)]
  formats: Vec<YtdlpFormat>,
}

#[derive(Deserialize, Debug)]
struct YtdlpFormat {
  format_id: String,
  ext: String,
  vcodec: Option<String>,
  acodec: Option<String>,
  height: Option<u32>,
  fps: Option<f32>,
  abr: Option<f64>,
}

// used to remove cred info from proxy url before printing
static AUTH_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"//[^:/]+(:[^@]+)?@").unwrap());

fn redact_proxy(proxy: &str) -> String {
  AUTH_REGEX.replace(proxy, "//<REDACTED>@").into_owned()
}

fn has_codec(codec: &Option<String>) -> bool {
  codec.as_deref().map_or(false, |c| c != "none" && !c.is_empty())
}

impl YtdlpFormat {
  fn into_record(self) -> Option<RawStreamRecord> {
    // storyboards, hls manifests etc. carry non numeric ids
    let itag = self.format_id.parse().ok()?;
    let kind = StreamKind::from_tracks(
      has_codec(&self.vcodec),
      has_codec(&self.acodec),
    )?;

    let mime_type = match (kind, self.ext.as_str()) {
      (StreamKind::AudioOnly, "m4a") => "audio/mp4".to_owned(),
      (StreamKind::AudioOnly, ext) => format!("audio/{ext}"),
      (_, ext) => format!("video/{ext}"),
    };

    let quality_label = match kind {
      StreamKind::AudioOnly => None,
      _ => self.height.map(|h| match self.fps {
        Some(fps) if fps > 30.0 => format!("{h}p{}", fps.round() as u32),
        _ => format!("{h}p"),
      }),
    };

    Some(RawStreamRecord {
      kind,
      quality_label,
      mime_type,
      audio_bitrate_kbps: self.abr,
      stream_ref: StreamRef::Itag(itag),
    })
  }
}

impl Ytdlp {
  pub fn new(
    program: impl Into<String>,
    proxy: Option<String>,
    concurrency: usize,
    timeout: Duration,
  ) -> Self {
    if let Some(proxy) = &proxy {
      info!("yt-dlp using proxy: {}", redact_proxy(proxy));
    }

    let concurrency = concurrency.max(1);
    Self {
      program: program.into(),
      program_args: Vec::new(),
      proxy,
      timeout,
      extractions: Semaphore::new(concurrency),
      downloads: Arc::new(Semaphore::new(concurrency)),
    }
  }

  fn command(&self) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd.args(&self.program_args);
    cmd.arg("--no-progress").arg("--no-warnings");
    if let Some(proxy) = &self.proxy {
      cmd.arg("--proxy").arg(proxy);
    }
    cmd
  }

  fn timed_out(&self, video_id: &VideoId) -> Error {
    Error::Provider(format!(
      "yt-dlp timed out after {:?} for {video_id}",
      self.timeout
    ))
  }
}

fn detect_error(stderr: &str) -> Error {
  let line = stderr
    .lines()
    .find(|l| l.contains("ERROR:"))
    .unwrap_or(stderr)
    .trim()
    .to_owned();

  if line.contains("Video unavailable")
    || line.contains("Requested format is not available")
  {
    Error::NotFound(line)
  } else if line.is_empty() {
    Error::Provider("yt-dlp exited without output".to_owned())
  } else {
    Error::Provider(line)
  }
}

fn parse_output(stdout: &[u8]) -> Result<Vec<RawStreamRecord>> {
  let output: YtdlpOutput =
    serde_json::from_slice(stdout).map_err(Error::provider)?;
  Ok(
    output
      .formats
      .into_iter()
      .filter_map(YtdlpFormat::into_record)
      .collect(),
  )
}

#[async_trait]
impl Provider for Ytdlp {
  fn name(&self) -> &'static str {
    "yt-dlp"
  }

  async fn fetch_raw_streams(
    &self,
    video_id: &VideoId,
  ) -> Result<Vec<RawStreamRecord>> {
    let extraction = async {
      let _permit = self
        .extractions
        .acquire()
        .await
        .map_err(|e| Error::Provider(e.to_string()))?;
      // dropping the future on timeout kills the child
      let output = self
        .command()
        .arg("-j")
        .arg(video_id.watch_url())
        .kill_on_drop(true)
        .output()
        .await?;
      Ok::<_, Error>(output)
    };
    let output = tokio::time::timeout(self.timeout, extraction)
      .await
      .map_err(|_| self.timed_out(video_id))??;

    if !output.status.success() {
      return Err(detect_error(&String::from_utf8_lossy(&output.stderr)));
    }

    parse_output(&output.stdout)
  }

  async fn open_stream(
    &self,
    video_id: &VideoId,
    stream_ref: &StreamRef,
  ) -> Result<UpstreamStream> {
    // yt-dlp resolves the itag itself and refuses ones it doesn't list
    let StreamRef::Itag(itag) = stream_ref else {
      return Err(ref_not_found(video_id, stream_ref));
    };

    let permit = tokio::time::timeout(
      self.timeout,
      self.downloads.clone().acquire_owned(),
    )
    .await
    .map_err(|_| Error::Provider("too many running yt-dlp downloads".into()))?
    .map_err(|e| Error::Provider(e.to_string()))?;

    debug!("yt-dlp streaming {} format {}", video_id, itag);

    // yt-dlp -f 140 -o - 'https://youtube.com/watch?v=XXXXXXX'
    let mut child = self
      .command()
      .arg("-f")
      .arg(itag.to_string())
      .arg("-o")
      .arg("-")
      .arg(video_id.watch_url())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()?;

    let (Some(stdout), Some(mut stderr)) =
      (child.stdout.take(), child.stderr.take())
    else {
      return Err(Error::Provider("yt-dlp pipes not opened".to_owned()));
    };

    // drained concurrently so a chatty stderr can't block the child
    let stderr_task = tokio::spawn(async move {
      let mut buf = String::new();
      stderr.read_to_string(&mut buf).await.ok();
      buf
    });

    let mut stdout = ReaderStream::new(stdout);
    let first = match tokio::time::timeout(self.timeout, stdout.next()).await {
      Err(_) => return Err(self.timed_out(video_id)),
      Ok(Some(Ok(bytes))) => bytes,
      Ok(Some(Err(e))) => return Err(Error::Upstream(e.to_string())),
      Ok(None) => {
        let stderr = stderr_task.await.unwrap_or_default();
        return Err(detect_error(&stderr));
      }
    };

    // owns the child and the permit: dropping the relay kills yt-dlp and
    // frees the slot. A non-zero exit becomes a trailing error so the
    // response is aborted instead of ending as a complete body.
    let exit = futures::stream::once(async move {
      let _permit = permit;
      let status = child.wait().await;
      let stderr = stderr_task.await.unwrap_or_default();
      match status {
        Ok(status) if status.success() => None,
        Ok(status) => {
          warn!("yt-dlp stopped mid-stream with {}", status);
          Some(Err(detect_error(&stderr)))
        }
        Err(e) => Some(Err(Error::from(e))),
      }
    })
    .filter_map(futures::future::ready);

    let stream = futures::stream::once(async move { Ok(first) })
      .chain(stdout.map_err(|e| Error::Upstream(e.to_string())))
      .chain(exit)
      .boxed();

    Ok(UpstreamStream {
      stream,
      content_length: None,
    })
  }
}
