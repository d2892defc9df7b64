//! Records persisted by the dashboard store.
//!
//! Each entity comes with a `New*` input type (fields the caller supplies; the
//! store assigns ids and timestamps) and, where it can be edited, a `*Patch`.
//! `Option<Option<T>>` patch fields distinguish "leave alone" (`None`) from
//! "set to null" (`Some(None)`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Integer primary key shared by every table except `tweet`.
pub type Id = i64;

// ─── Users ───────────────────────────────────────────────────────────────────

/// A dashboard operator. Password material is kept out of this type; see
/// [`UserCredentials`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id:            Id,
  pub email:         String,
  pub name:          Option<String>,
  pub last_login_at: Option<DateTime<Utc>>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
  pub email:          String,
  pub name:           Option<String>,
  /// argon2 PHC string.
  pub password:       String,
  /// argon2 PHC string of the outstanding reset token, if any.
  pub password_reset: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
  pub email: Option<String>,
  pub name:  Option<Option<String>>,
}

/// Stored password hashes for a user.
#[derive(Debug, Clone)]
pub struct UserCredentials {
  pub password:       Option<String>,
  pub password_reset: Option<String>,
}

// ─── Camps ───────────────────────────────────────────────────────────────────

/// A coarse grouping a handle may belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camp {
  pub id:          Id,
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCamp {
  pub name:        String,
  pub description: Option<String>,
}

// ─── Handles ─────────────────────────────────────────────────────────────────

/// A tracked social-media account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handle {
  pub id:               Id,
  /// Numeric account id on the social network.
  pub uid:              i64,
  pub username:         String,
  pub name:             String,
  /// Free-form profile blob as returned by the social network.
  pub profile:          serde_json::Value,
  pub camp_id:          Option<Id>,
  /// Influence-service identity; handles without one are never refreshed.
  pub klout_id:         Option<String>,
  /// Latest cached influence score.
  pub klout_score:      Option<f64>,
  /// Last time the refresh job attempted this handle, successful or not.
  pub klout_checked_at: Option<DateTime<Utc>>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHandle {
  pub uid:      i64,
  pub username: String,
  pub name:     String,
  pub profile:  serde_json::Value,
  pub camp_id:  Option<Id>,
  pub klout_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HandlePatch {
  pub name:    Option<String>,
  pub camp_id: Option<Option<Id>>,
}

/// A handle with its requested relations expanded inline.
#[derive(Debug, Clone, Serialize)]
pub struct HandleView {
  #[serde(flatten)]
  pub handle:       Handle,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub camp:         Option<Camp>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub topics:       Option<Vec<Topic>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub klout_scores: Option<Vec<KloutScore>>,
}

impl HandleView {
  pub fn bare(handle: Handle) -> Self {
    Self { handle, camp: None, topics: None, klout_scores: None }
  }
}

// ─── Influence scores ────────────────────────────────────────────────────────

/// One influence-score sample. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KloutScore {
  pub id:          Id,
  pub handle_id:   Id,
  pub value:       f64,
  pub delta_day:   f64,
  pub delta_week:  f64,
  pub delta_month: f64,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewKloutScore {
  pub value:       f64,
  pub delta_day:   f64,
  pub delta_week:  f64,
  pub delta_month: f64,
}

// ─── Topics ──────────────────────────────────────────────────────────────────

/// A named classification a handle can be tagged with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
  pub id:          Id,
  pub name:        String,
  pub description: Option<String>,
  pub keywords:    Vec<String>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTopic {
  pub name:        String,
  pub description: Option<String>,
  pub keywords:    Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TopicPatch {
  pub name:        Option<String>,
  pub description: Option<Option<String>>,
  pub keywords:    Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicView {
  #[serde(flatten)]
  pub topic:   Topic,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub handles: Option<Vec<Handle>>,
}

// ─── Tweets ──────────────────────────────────────────────────────────────────

/// A status known to the dashboard. The id is the social network's status id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
  pub id:         String,
  pub handle_id:  Option<Id>,
  pub parent_id:  Option<String>,
  pub text:       String,
  pub retweeted:  bool,
  pub favorited:  bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTweet {
  pub id:         String,
  pub handle_id:  Option<Id>,
  pub parent_id:  Option<String>,
  pub text:       String,
  pub created_at: DateTime<Utc>,
}

/// A local flag mirrored from an upstream action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweetFlag {
  Retweeted(bool),
  Favorited(bool),
}

#[derive(Debug, Clone, Serialize)]
pub struct TweetView {
  #[serde(flatten)]
  pub tweet:   Tweet,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub handle:  Option<Handle>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent:  Option<Tweet>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub replies: Option<Vec<Tweet>>,
}

// ─── Infographics ────────────────────────────────────────────────────────────

/// A media file held in file storage that can be attached to a tweet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Infographic {
  pub id:         Id,
  pub name:       String,
  pub file_size:  i64,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInfographic {
  pub name:      String,
  pub file_size: i64,
}
