use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::warn;

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("{0}")]
  InvalidInput(String),
  #[error("{0}")]
  NotFound(String),
  #[error("provider error: {0}")]
  Provider(String),
  #[error("upstream fetch failed: {0}")]
  Upstream(String),
  #[error("io error: {0}")]
  IO(#[from] std::io::Error),
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("invalid configuration: {0}")]
  Config(String),
  #[error("server error: {0}")]
  Server(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn provider(err: impl std::fmt::Display) -> Self {
    Error::Provider(err.to_string())
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::Provider(_)
      | Error::IO(_)
      | Error::Config(_)
      | Error::Server(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      Error::Upstream(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      warn!("request failed: {}", self);
    }

    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_status_mapping() {
    let invalid = Error::InvalidInput("bad id".into());
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    assert_eq!(invalid.to_string(), "bad id");

    assert_eq!(
      Error::NotFound("gone".into()).status(),
      StatusCode::NOT_FOUND
    );
    assert_eq!(
      Error::provider("private video").status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
      Error::Upstream("reset".into()).status(),
      StatusCode::BAD_GATEWAY
    );
  }

  #[test]
  fn test_provider_message_kept() {
    let err = Error::provider("Video unavailable");
    assert_eq!(err.to_string(), "provider error: Video unavailable");
  }
}
