//! Extractors and request-shape helpers shared by the handlers.
//!
//! [`ApiPath`] and [`ApiJson`] wrap axum's own extractors so malformed path
//! segments and bodies are answered with the JSON error body rather than
//! axum's plain-text rejections.

use axum::{
  Json,
  extract::{FromRequest, FromRequestParts, Path, Request},
  http::request::Parts,
};
use dash_core::query::{Page, SortOrder, parse_choice, parse_page};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};

use crate::error::ApiError;

// ─── Extractors ──────────────────────────────────────────────────────────────

/// Path parameters, e.g. `ApiPath(id): ApiPath<Id>` or
/// `ApiPath((id, topic_id)): ApiPath<(Id, Id)>`.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
  T: DeserializeOwned + Send,
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
    let Path(value) = Path::<T>::from_request_parts(parts, state)
      .await
      .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(ApiPath(value))
  }
}

/// A JSON request body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
  T: DeserializeOwned,
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let Json(value) = Json::<T>::from_request(req, state)
      .await
      .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(ApiJson(value))
  }
}

// ─── Query parameters ────────────────────────────────────────────────────────

/// Raw list parameters shared by `/handles`, `/topics` and `/users`. Values
/// stay strings here; [`dash_core::query`] parses and validates them.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub filter:     Option<String>,
  pub sort:       Option<String>,
  #[serde(rename = "sortOrder")]
  pub sort_order: Option<String>,
  pub page:       Option<String>,
  #[serde(rename = "pageSize")]
  pub page_size:  Option<String>,
  pub related:    Option<String>,
}

impl ListParams {
  pub fn order(&self) -> Result<SortOrder, ApiError> {
    Ok(parse_choice("sortOrder", self.sort_order.as_deref(), SortOrder::Asc)?)
  }

  pub fn page(&self) -> Result<Page, ApiError> {
    Ok(parse_page(self.page.as_deref(), self.page_size.as_deref())?)
  }
}

/// `?related=...` on single-resource reads.
#[derive(Debug, Default, Deserialize)]
pub struct RelatedParams {
  pub related: Option<String>,
}

// ─── Body helpers ────────────────────────────────────────────────────────────

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

/// Trim `value` and reject it if empty.
pub fn required(field: &'static str, value: &str) -> Result<String, ApiError> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(
      dash_core::Error::validation(field, format!("[{field:?} is not allowed to be empty]")).into(),
    );
  }
  Ok(trimmed.to_owned())
}
