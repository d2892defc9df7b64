//! Configuration and wiring for the dashboard server binary.
//!
//! [`ServerConfig`] is layered from `config.toml` and `DASH_`-prefixed
//! environment variables (nested keys use `__`, e.g.
//! `DASH_TWITTER__CONSUMER_KEY`). [`build_state`] turns it into the
//! [`AppState`] the router runs on.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use dash_api::AppState;
use dash_core::{ServiceError, store::DashboardStore};
use dash_services::{
  KloutClient, KloutConfig, LocalFileStore, LogMailer, TwitterClient, TwitterConfig, klout, twitter,
};
use serde::Deserialize;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  /// Base URL of the front end, used in set-password links.
  #[serde(default = "default_front_url")]
  pub front_url:  String,
  #[serde(default)]
  pub klout:      KloutSection,
  #[serde(default)]
  pub twitter:    TwitterSection,
  #[serde(default)]
  pub files:      FilesSection,
  #[serde(default)]
  pub mail:       MailSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KloutSection {
  pub api_key:       String,
  pub base_url:      String,
  /// Seconds between score refreshes; `0` disables the job.
  pub interval_secs: u64,
}

impl Default for KloutSection {
  fn default() -> Self {
    Self { api_key: String::new(), base_url: klout::DEFAULT_BASE_URL.into(), interval_secs: 0 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitterSection {
  pub consumer_key:        String,
  pub consumer_secret:     String,
  pub access_token:        String,
  pub access_token_secret: String,
  pub base_url:            String,
  pub upload_url:          String,
}

impl Default for TwitterSection {
  fn default() -> Self {
    Self {
      consumer_key:        String::new(),
      consumer_secret:     String::new(),
      access_token:        String::new(),
      access_token_secret: String::new(),
      base_url:            twitter::DEFAULT_BASE_URL.into(),
      upload_url:          twitter::DEFAULT_UPLOAD_URL.into(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesSection {
  /// Directory infographics are read from.
  pub root: PathBuf,
}

impl Default for FilesSection {
  fn default() -> Self { Self { root: PathBuf::from("files") } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailSection {
  pub from: String,
}

impl Default for MailSection {
  fn default() -> Self { Self { from: "dashboard@localhost".into() } }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("dashboard.sqlite") }
fn default_front_url() -> String { "http://localhost:3000".into() }

impl ServerConfig {
  /// Layer `path` (optional) and `DASH_*` environment variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("DASH").separator("__"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn refresh_interval(&self) -> Duration { Duration::from_secs(self.klout.interval_secs) }

  pub fn klout_config(&self) -> KloutConfig {
    KloutConfig { api_key: self.klout.api_key.clone(), base_url: self.klout.base_url.clone() }
  }

  pub fn twitter_config(&self) -> TwitterConfig {
    let t = &self.twitter;
    TwitterConfig {
      consumer_key:        t.consumer_key.clone(),
      consumer_secret:     t.consumer_secret.clone(),
      access_token:        t.access_token.clone(),
      access_token_secret: t.access_token_secret.clone(),
      base_url:            t.base_url.clone(),
      upload_url:          t.upload_url.clone(),
    }
  }
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

/// Build the router state: HTTP clients for Klout and Twitter, the log
/// mailer, and the directory-backed file store.
pub fn build_state<S>(config: &ServerConfig, store: Arc<S>) -> Result<AppState<S>, ServiceError>
where
  S: DashboardStore,
{
  if config.klout.api_key.is_empty() {
    tracing::warn!("klout.api_key is empty; identity lookups will fail");
  }
  if config.twitter.consumer_key.is_empty() {
    tracing::warn!("twitter.consumer_key is empty; Twitter calls will fail");
  }

  Ok(AppState {
    store,
    social: Arc::new(TwitterClient::new(config.twitter_config())?),
    influence: Arc::new(KloutClient::new(config.klout_config())?),
    mailer: Arc::new(LogMailer::new(config.mail.from.clone())),
    files: Arc::new(LocalFileStore::new(expand_tilde(&config.files.root))),
    front_url: Arc::from(config.front_url.as_str()),
  })
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
