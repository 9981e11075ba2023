use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Error, Result};

static BARE_ID_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

// watch?v=, youtu.be/, /embed/, /v/, /e/, /shorts/, /live/ and channel-ish
// paths with the id as the last segment.
static URL_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"(?:youtube(?:-nocookie)?\.com/(?:(?:v|e(?:mbed)?|shorts|live)/|[^/\s]+/.+/|.*[?&]v=)|youtu\.be/)([A-Za-z0-9_-]{11})",
  )
  .unwrap()
});

/// An 11 character YouTube video identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
  /// Accepts a bare identifier or any of the common YouTube URL shapes.
  pub fn parse(input: &str) -> Result<Self> {
    let input = input.trim();
    if input.is_empty() {
      return Err(Error::InvalidInput("Valid Video ID is required".into()));
    }

    if BARE_ID_REGEX.is_match(input) {
      return Ok(VideoId(input.to_owned()));
    }

    URL_ID_REGEX
      .captures(input)
      .and_then(|caps| caps.get(1))
      .map(|m| VideoId(m.as_str().to_owned()))
      .ok_or_else(|| {
        Error::InvalidInput(format!("not a valid video id or url: {input}"))
      })
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn watch_url(&self) -> String {
    format!("https://www.youtube.com/watch?v={}", self.0)
  }
}

impl fmt::Display for VideoId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn id(input: &str) -> Option<String> {
    VideoId::parse(input).ok().map(|id| id.as_str().to_owned())
  }

  #[test]
  fn test_bare_id() {
    assert_eq!(id("dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(id("  dQw4w9WgXcQ ").as_deref(), Some("dQw4w9WgXcQ"));
  }

  #[test]
  fn test_url_shapes() {
    let expect = Some("dQw4w9WgXcQ");
    assert_eq!(
      id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
      expect
    );
    assert_eq!(
      id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=1")
        .as_deref(),
      expect
    );
    assert_eq!(id("https://youtu.be/dQw4w9WgXcQ").as_deref(), expect);
    assert_eq!(
      id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
      expect
    );
    assert_eq!(id("https://m.youtube.com/v/dQw4w9WgXcQ").as_deref(), expect);
    assert_eq!(
      id("https://www.youtube.com/shorts/abcdefghijk").as_deref(),
      Some("abcdefghijk")
    );
  }

  #[test]
  fn test_rejects_garbage() {
    assert!(matches!(VideoId::parse(""), Err(Error::InvalidInput(_))));
    assert!(matches!(VideoId::parse("   "), Err(Error::InvalidInput(_))));
    assert!(VideoId::parse("not a url").is_err());
    assert!(VideoId::parse("short").is_err());
    assert!(VideoId::parse("https://example.com/watch?v=dQw4w9WgXcQ").is_err());
  }

  #[test]
  fn test_watch_url() {
    let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
    assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
  }
}
