use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use tracing::info;

use crate::{
  provider::{self, Piped, Provider, Rustube, Ytdlp},
  Error, Result,
};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
  Rustube,
  Ytdlp,
  Piped,
}

impl FromStr for ProviderKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "rustube" => Ok(ProviderKind::Rustube),
      "ytdlp" | "yt-dlp" => Ok(ProviderKind::Ytdlp),
      "piped" => Ok(ProviderKind::Piped),
      other => Err(Error::Config(format!("unknown PROVIDER: {other}"))),
    }
  }
}

#[derive(Clone, Debug)]
pub struct Config {
  pub listen_addr: SocketAddr,
  pub provider: ProviderKind,
  pub piped_instance: String,
  pub ytdlp_path: String,
  pub ytdlp_proxy: Option<String>,
  pub ytdlp_concurrency: usize,
  pub timeout: Duration,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
    fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
      value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid {key}: {value}")))
    }

    let listen_addr = get("LISTEN_ADDR")
      .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned());
    let provider = match get("PROVIDER") {
      Some(p) => p.parse()?,
      None => ProviderKind::Ytdlp,
    };
    let ytdlp_concurrency = match get("YTDLP_CONCURRENCY") {
      Some(v) => parse("YTDLP_CONCURRENCY", &v)?,
      None => 1,
    };
    let timeout_secs = match get("UPSTREAM_TIMEOUT_SECS") {
      Some(v) => parse("UPSTREAM_TIMEOUT_SECS", &v)?,
      None => DEFAULT_TIMEOUT_SECS,
    };

    Ok(Config {
      listen_addr: parse("LISTEN_ADDR", &listen_addr)?,
      provider,
      piped_instance: get("PIPED_INSTANCE")
        .unwrap_or_else(|| provider::DEFAULT_PIPED_INSTANCE.to_owned()),
      ytdlp_path: get("YTDLP_PATH")
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "yt-dlp".to_owned()),
      ytdlp_proxy: get("YTDLP_PROXY").filter(|p| !p.is_empty()),
      ytdlp_concurrency,
      timeout: Duration::from_secs(timeout_secs),
    })
  }

  pub fn build_provider(
    &self,
    client: &reqwest::Client,
  ) -> Arc<dyn Provider> {
    info!("using {:?} provider", self.provider);

    match self.provider {
      ProviderKind::Rustube => {
        Arc::new(Rustube::new(client.clone(), self.timeout))
      }
      ProviderKind::Ytdlp => Arc::new(Ytdlp::new(
        &self.ytdlp_path,
        self.ytdlp_proxy.clone(),
        self.ytdlp_concurrency,
        self.timeout,
      )),
      ProviderKind::Piped => Arc::new(Piped::new(
        client.clone(),
        &self.piped_instance,
        self.timeout,
      )),
    }
  }
}

#[cfg(test)]
mod test {
  use std::collections::HashMap;

  use super::*;

  fn config(vars: &[(&str, &str)]) -> Result<Config> {
    let vars: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    Config::from_lookup(|key| vars.get(key).cloned())
  }

  #[test]
  fn test_defaults() {
    let config = config(&[]).unwrap();
    assert_eq!(config.listen_addr.to_string(), DEFAULT_LISTEN_ADDR);
    assert_eq!(config.provider, ProviderKind::Ytdlp);
    assert_eq!(config.piped_instance, provider::DEFAULT_PIPED_INSTANCE);
    assert_eq!(config.ytdlp_path, "yt-dlp");
    assert_eq!(config.ytdlp_proxy, None);
    assert_eq!(config.ytdlp_concurrency, 1);
    assert_eq!(config.timeout, Duration::from_secs(30));
  }

  #[test]
  fn test_overrides() {
    let config = config(&[
      ("LISTEN_ADDR", "127.0.0.1:3000"),
      ("PROVIDER", "Piped"),
      ("PIPED_INSTANCE", "https://piped.example"),
      ("YTDLP_PATH", "/opt/yt-dlp/bin/yt-dlp"),
      ("YTDLP_PROXY", "socks5://127.0.0.1:1080"),
      ("YTDLP_CONCURRENCY", "4"),
      ("UPSTREAM_TIMEOUT_SECS", "5"),
    ])
    .unwrap();

    assert_eq!(config.listen_addr.port(), 3000);
    assert_eq!(config.provider, ProviderKind::Piped);
    assert_eq!(config.piped_instance, "https://piped.example");
    assert_eq!(config.ytdlp_path, "/opt/yt-dlp/bin/yt-dlp");
    assert_eq!(
      config.ytdlp_proxy.as_deref(),
      Some("socks5://127.0.0.1:1080")
    );
    assert_eq!(config.ytdlp_concurrency, 4);
    assert_eq!(config.timeout, Duration::from_secs(5));
  }

  #[test]
  fn test_invalid_values() {
    assert!(matches!(config(&[("PROVIDER", "vlc")]), Err(Error::Config(_))));
    assert!(matches!(
      config(&[("YTDLP_CONCURRENCY", "many")]),
      Err(Error::Config(_))
    ));
    assert!(matches!(
      config(&[("LISTEN_ADDR", "localhost")]),
      Err(Error::Config(_))
    ));
  }
}
