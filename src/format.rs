//! Turns the raw stream list of a provider into the ranked list of
//! downloadable formats served by `/formats`.

use std::{cmp::Ordering, collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

use crate::provider::{RawStreamRecord, StreamKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
  Mp4,
  Webm,
  Mp3,
  Opus,
}

// lower sorts first
const FORMAT_PRIORITY: [(Format, u8); 4] = [
  (Format::Mp4, 0),
  (Format::Webm, 1),
  (Format::Mp3, 2),
  (Format::Opus, 3),
];

impl Format {
  pub fn priority(self) -> u8 {
    FORMAT_PRIORITY
      .iter()
      .find_map(|(format, prio)| (*format == self).then_some(*prio))
      .unwrap_or(u8::MAX)
  }

  pub fn is_audio(self) -> bool {
    matches!(self, Format::Mp3 | Format::Opus)
  }

  pub fn container(self) -> &'static str {
    match self {
      Format::Mp4 => "mp4",
      Format::Webm => "webm",
      Format::Mp3 => "mp3",
      Format::Opus => "opus",
    }
  }

  // video formats are told apart by the container in the mime type
  fn video_from_mime(mime_type: &str) -> Option<Self> {
    if mime_type.contains("mp4") {
      Some(Format::Mp4)
    } else if mime_type.contains("webm") {
      Some(Format::Webm)
    } else {
      None
    }
  }
}

impl fmt::Display for Format {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Format::Mp4 => "MP4",
      Format::Webm => "WEBM",
      Format::Mp3 => "MP3",
      Format::Opus => "OPUS",
    })
  }
}

/// Opaque handle to a single rendition, handed back on `/download`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRef {
  Itag(u64),
  /// Accepted on the wire for compatibility with url-based clients only.
  /// None of the bundled providers lists url refs, so opening one always
  /// fails with `NotFound`.
  Url(String),
}

impl StreamRef {
  pub fn parse(s: &str) -> Option<Self> {
    let s = s.trim();
    if s.is_empty() {
      return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
      return s.parse().ok().map(StreamRef::Itag);
    }

    (s.starts_with("https://") || s.starts_with("http://"))
      .then(|| StreamRef::Url(s.to_owned()))
  }
}

impl fmt::Display for StreamRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StreamRef::Itag(itag) => write!(f, "{itag}"),
      StreamRef::Url(url) => f.write_str(url),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescriptor {
  pub quality: String,
  pub format: Format,
  pub label: String,
  pub container: String,
  pub has_audio: bool,
  #[serde(flatten)]
  pub stream_ref: StreamRef,
}

impl FormatDescriptor {
  pub fn key(&self) -> FormatKey {
    FormatKey {
      quality: self.quality.clone(),
      format: self.format,
    }
  }
}

/// Deduplication key of a resolved list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FormatKey {
  pub quality: String,
  pub format: Format,
}

/// Leading integer of a quality label: "1080p60" is 1080, "128kbps" is 128.
pub fn numeric_quality(label: &str) -> Option<u64> {
  let digits: String = label
    .trim_start()
    .chars()
    .take_while(|c| c.is_ascii_digit())
    .collect();
  digits.parse().ok()
}

/// Total order of the resolved list: video before audio, then the format
/// priority table, then numeric quality descending with unparsable labels
/// last.
pub fn compare(a: &FormatDescriptor, b: &FormatDescriptor) -> Ordering {
  a.format
    .is_audio()
    .cmp(&b.format.is_audio())
    .then_with(|| a.format.priority().cmp(&b.format.priority()))
    .then_with(|| {
      match (numeric_quality(&a.quality), numeric_quality(&b.quality)) {
        (Some(qa), Some(qb)) => qb.cmp(&qa),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
      }
    })
}

pub fn rank(records: Vec<RawStreamRecord>) -> Vec<FormatDescriptor> {
  let mut audio = Vec::new();
  let mut seen = HashSet::new();
  let mut formats = Vec::new();

  for record in records {
    if record.kind == StreamKind::AudioOnly {
      audio.push(record);
      continue;
    }

    // first occurrence in provider order wins within (quality, container)
    if let Some(desc) = video_descriptor(record) {
      if seen.insert(desc.key()) {
        formats.push(desc);
      }
    }
  }

  // stable: equal bitrates keep provider order
  audio.sort_by(|a, b| bitrate(b).total_cmp(&bitrate(a)));

  for (format, mime) in [(Format::Mp3, "mp4"), (Format::Opus, "webm")] {
    let best = audio.iter().find(|r| r.mime_type.contains(mime));
    if let Some(desc) = best.map(|record| audio_descriptor(record, format)) {
      if seen.insert(desc.key()) {
        formats.push(desc);
      }
    }
  }

  formats.sort_by(compare);
  formats
}

fn video_descriptor(record: RawStreamRecord) -> Option<FormatDescriptor> {
  let quality = record.quality_label.filter(|q| !q.trim().is_empty())?;
  let format = Format::video_from_mime(&record.mime_type)?;

  Some(FormatDescriptor {
    label: quality.clone(),
    quality,
    format,
    container: format.container().to_owned(),
    has_audio: record.kind == StreamKind::Muxed,
    stream_ref: record.stream_ref,
  })
}

// unknown or non finite bitrates rank last
fn bitrate(record: &RawStreamRecord) -> f64 {
  record
    .audio_bitrate_kbps
    .filter(|kbps| kbps.is_finite())
    .unwrap_or(0.0)
}

fn audio_descriptor(
  record: &RawStreamRecord,
  format: Format,
) -> FormatDescriptor {
  let kbps = bitrate(record).round() as u64;

  FormatDescriptor {
    quality: format!("{kbps}kbps"),
    format,
    label: "Audio".to_owned(),
    container: format.container().to_owned(),
    has_audio: true,
    stream_ref: record.stream_ref.clone(),
  }
}
