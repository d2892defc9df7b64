//! Error type for `dash-store-sqlite`.

use dash_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] dash_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("unknown schema version {0}")]
  UnknownVersion(u32),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, Some(msg))) = &e
      && failure.code == rusqlite::ErrorCode::ConstraintViolation
      && let Some(target) = msg.strip_prefix("UNIQUE constraint failed: ")
    {
      return Error::Core(dash_core::Error::Conflict(conflict_message(target)));
    }
    Error::Database(e)
  }
}

impl StoreError for Error {
  fn as_domain(&self) -> Option<&dash_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

/// Human-readable message for a violated unique constraint, keyed by the
/// `table.column` list SQLite reports.
fn conflict_message(target: &str) -> String {
  match target {
    "user.email" => "Email already in use.".to_owned(),
    "handle.uid" => "Handle is already tracked".to_owned(),
    "handle.username" => "Username is already tracked".to_owned(),
    "handle_topic.handle_id, handle_topic.topic_id" => "Topic already attached".to_owned(),
    "infographic.name" => "Infographic already registered".to_owned(),
    "tweet.id" => "Tweet already stored".to_owned(),
    other => format!("duplicate value for {other}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unique_violations_become_conflicts() {
    let failure = rusqlite::Error::SqliteFailure(
      rusqlite::ffi::Error {
        code:          rusqlite::ErrorCode::ConstraintViolation,
        extended_code: 2067,
      },
      Some("UNIQUE constraint failed: user.email".to_owned()),
    );
    let err = Error::from(tokio_rusqlite::Error::Rusqlite(failure));
    match err.as_domain() {
      Some(dash_core::Error::Conflict(msg)) => assert_eq!(msg, "Email already in use."),
      other => panic!("expected conflict, got {other:?}"),
    }
  }

  #[test]
  fn other_failures_stay_infrastructure_errors() {
    let err = Error::from(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::InvalidQuery));
    assert!(err.as_domain().is_none());
  }
}
