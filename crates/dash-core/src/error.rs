//! Error types for `dash-core`.

use std::fmt;

use thiserror::Error;

/// The kind of record a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  User,
  Camp,
  Handle,
  Topic,
  Tweet,
  Infographic,
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Entity::User => "User",
      Entity::Camp => "Camp",
      Entity::Handle => "Handle",
      Entity::Topic => "Topic",
      Entity::Tweet => "Tweet",
      Entity::Infographic => "Infographic",
    })
  }
}

/// Domain errors. Storage backends surface these through
/// [`StoreError::as_domain`](crate::store::StoreError::as_domain) so the API
/// layer can map them to response codes in one place.
#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} not found")]
  NotFound { entity: Entity, id: String },

  /// A unique constraint would be violated.
  #[error("{0}")]
  Conflict(String),

  #[error("Topic already attached")]
  AlreadyAttached,

  #[error("Topic not attached")]
  NotAttached,

  /// Input outside the accepted shape or allow-list.
  #[error("child \"{field}\" fails because {message}")]
  Validation { field: &'static str, message: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn not_found(entity: Entity, id: impl ToString) -> Self {
    Error::NotFound { entity, id: id.to_string() }
  }

  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    Error::Validation { field, message: message.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors reported by the external service adapters.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
  /// The upstream has no such user, identity, or file.
  #[error("not found upstream")]
  NotFound,

  /// The status was already retweeted by the authenticated account.
  #[error("already retweeted")]
  AlreadyRetweeted,

  /// The status no longer exists upstream.
  #[error("tweet deleted upstream")]
  TweetDeleted,

  #[error("rate limited")]
  RateLimited,

  #[error("upstream error {code}: {message}")]
  Api { code: i64, message: String },

  #[error("transport error: {0}")]
  Transport(String),

  #[error("could not decode upstream response: {0}")]
  Decode(String),
}
