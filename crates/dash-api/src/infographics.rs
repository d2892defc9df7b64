//! Handlers for `/infographics` endpoints.

use axum::{Json, extract::State};
use dash_core::{
  ServiceError,
  model::{Infographic, NewInfographic},
  store::DashboardStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  error::ApiError,
  extract::{ApiJson, required},
};

/// `GET /infographics`
pub async fn list<S>(State(state): State<AppState<S>>) -> Result<Json<Vec<Infographic>>, ApiError>
where
  S: DashboardStore,
{
  Ok(Json(state.store.list_infographics().await.map_err(ApiError::store)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /infographics`: register a file already present in file storage.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<Json<Infographic>, ApiError>
where
  S: DashboardStore,
{
  let name = required("name", &body.name)?;
  let size = state.files.size(&name).await.map_err(|e| match e {
    ServiceError::NotFound => ApiError::NotFound("File not found".into()),
    other => ApiError::Internal(other.to_string()),
  })?;
  let file_size = i64::try_from(size)
    .map_err(|_| ApiError::BadRequest(format!("file {name} is too large")))?;

  let infographic = state
    .store
    .create_infographic(NewInfographic { name, file_size })
    .await
    .map_err(ApiError::store)?;
  tracing::info!(infographic_id = infographic.id, file_size, "registered infographic");
  Ok(Json(infographic))
}
