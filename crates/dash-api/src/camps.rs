//! Handlers for `/camps` endpoints.

use axum::{Json, extract::State, http::StatusCode};
use dash_core::{
  Entity,
  model::{Camp, Id, NewCamp},
  store::DashboardStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  error::ApiError,
  extract::{ApiJson, ApiPath, required},
};

fn not_found(id: Id) -> ApiError { dash_core::Error::not_found(Entity::Camp, id).into() }

/// `GET /camps`
pub async fn list<S>(State(state): State<AppState<S>>) -> Result<Json<Vec<Camp>>, ApiError>
where
  S: DashboardStore,
{
  Ok(Json(state.store.list_camps().await.map_err(ApiError::store)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:        String,
  pub description: Option<String>,
}

/// `POST /camps`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<Json<Camp>, ApiError>
where
  S: DashboardStore,
{
  let input = NewCamp { name: required("name", &body.name)?, description: body.description };
  let camp = state.store.create_camp(input).await.map_err(ApiError::store)?;
  Ok(Json(camp))
}

/// `GET /camps/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
) -> Result<Json<Camp>, ApiError>
where
  S: DashboardStore,
{
  let camp = state
    .store
    .get_camp(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(camp))
}

/// `DELETE /camps/{id}`: member handles keep existing with no camp.
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
) -> Result<StatusCode, ApiError>
where
  S: DashboardStore,
{
  if !state.store.delete_camp(id).await.map_err(ApiError::store)? {
    return Err(not_found(id));
  }
  Ok(StatusCode::NO_CONTENT)
}
