//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error renders as `{"statusCode": 404, "error": "Not Found",
//! "message": "Handle not found"}`.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use dash_core::{ServiceError, store::StoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("payload too large: {0}")]
  TooLarge(String),

  /// A third-party service failed while serving the request.
  #[error("upstream error: {0}")]
  Upstream(String),

  #[error("internal error: {0}")]
  Internal(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a store error, surfacing the domain error it carries if any.
  pub fn store<E: StoreError>(e: E) -> Self {
    if let Some(domain) = e.as_domain() {
      return Self::from_domain(domain);
    }
    ApiError::Store(Box::new(e))
  }

  fn from_domain(e: &dash_core::Error) -> Self {
    use dash_core::Error as E;
    match e {
      E::NotFound { .. } => ApiError::NotFound(e.to_string()),
      E::Conflict(_) | E::AlreadyAttached | E::NotAttached | E::Validation { .. } => {
        ApiError::BadRequest(e.to_string())
      }
      E::Serialization(_) => ApiError::Internal(e.to_string()),
    }
  }

  /// Map a third-party failure that has no request-specific meaning.
  pub fn upstream(e: ServiceError) -> Self { ApiError::Upstream(e.to_string()) }
}

impl From<dash_core::Error> for ApiError {
  fn from(e: dash_core::Error) -> Self { Self::from_domain(&e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::TooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
      ApiError::Upstream(m) => {
        tracing::warn!(error = %m, "upstream service failed");
        (StatusCode::BAD_GATEWAY, m.clone())
      }
      ApiError::Internal(_) | ApiError::Store(_) => {
        tracing::error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "An internal server error occurred".to_owned())
      }
    };
    let body = json!({
      "statusCode": status.as_u16(),
      "error": status.canonical_reason().unwrap_or_default(),
      "message": message,
    });
    (status, Json(body)).into_response()
  }
}
