//! Narrow interfaces over the third-party services the dashboard talks to.
//!
//! Implementations live in `dash-services`; tests substitute in-process fakes.
//! The traits are object-safe (`async-trait`) so the API state can hold them as
//! `Arc<dyn ...>` without threading extra generic parameters through every
//! handler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ServiceError;

// ─── Influence score ─────────────────────────────────────────────────────────

/// Current score plus its recent movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceScore {
  pub score:        f64,
  pub day_change:   f64,
  pub week_change:  f64,
  pub month_change: f64,
}

#[async_trait]
pub trait InfluenceService: Send + Sync {
  /// Resolve a social username to its influence identity. `Ok(None)` when
  /// the service has no identity for the user.
  async fn identity(&self, username: &str) -> Result<Option<String>, ServiceError>;

  /// Fetch the current score for an influence identity.
  async fn score(&self, identity: &str) -> Result<InfluenceScore, ServiceError>;
}

// ─── Social network ──────────────────────────────────────────────────────────

/// Public profile of a social-network account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialProfile {
  pub uid:      i64,
  pub username: String,
  pub name:     String,
  /// The raw profile object, stored verbatim on the handle.
  pub profile:  serde_json::Value,
}

/// A status to publish.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
  pub text:        String,
  pub in_reply_to: Option<String>,
  pub media_ids:   Vec<String>,
}

/// A status as returned by the network after publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedStatus {
  pub id:          String,
  pub text:        String,
  pub in_reply_to: Option<String>,
  pub author_uid:  i64,
  pub created_at:  DateTime<Utc>,
}

#[async_trait]
pub trait SocialService: Send + Sync {
  async fn user_profile(&self, username: &str) -> Result<SocialProfile, ServiceError>;

  async fn update_status(&self, update: StatusUpdate) -> Result<PostedStatus, ServiceError>;

  /// Upload media bytes and return the media id to attach to a status.
  async fn upload_media(&self, bytes: Vec<u8>) -> Result<String, ServiceError>;

  async fn retweet(&self, status_id: &str) -> Result<(), ServiceError>;

  async fn favorite(&self, status_id: &str) -> Result<(), ServiceError>;

  async fn unfavorite(&self, status_id: &str) -> Result<(), ServiceError>;
}

// ─── Mail ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
  pub to:       String,
  pub subject:  String,
  /// Template name, e.g. `set-password`.
  pub template: String,
  pub context:  serde_json::Value,
}

#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(&self, email: Email) -> Result<(), ServiceError>;
}

// ─── File storage ────────────────────────────────────────────────────────────

#[async_trait]
pub trait FileStore: Send + Sync {
  /// Read a stored file. [`ServiceError::NotFound`] when it does not exist.
  async fn fetch(&self, name: &str) -> Result<Vec<u8>, ServiceError>;

  /// Size in bytes of a stored file.
  async fn size(&self, name: &str) -> Result<u64, ServiceError>;
}
