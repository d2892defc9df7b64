//! Adapters for the third-party services the dashboard talks to, and the
//! periodic influence-score refresh job.
//!
//! Each adapter implements one of the traits in [`dash_core::service`], so the
//! API and the refresh job never see HTTP or filesystem details.

pub mod files;
pub mod klout;
pub mod mail;
pub mod refresh;
pub mod twitter;

pub use files::LocalFileStore;
pub use klout::{KloutClient, KloutConfig};
pub use mail::LogMailer;
pub use refresh::{RefreshHandle, ScoreRefresher, TickOutcome};
pub use twitter::{TwitterClient, TwitterConfig};

use std::time::Duration;

use dash_core::ServiceError;

/// Request timeout shared by the HTTP adapters.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client() -> Result<reqwest::Client, ServiceError> {
  reqwest::Client::builder()
    .timeout(HTTP_TIMEOUT)
    .build()
    .map_err(|e| ServiceError::Transport(format!("failed to build HTTP client: {e}")))
}

pub(crate) fn transport(e: reqwest::Error) -> ServiceError { ServiceError::Transport(e.to_string()) }
