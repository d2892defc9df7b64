//! Handlers for `/handles` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/handles` | `filter`, `sort`, `sortOrder`, `page`, `pageSize`, `related` |
//! | `POST`   | `/handles` | Body: `{"username": "...", "camp_id"?}`; profile looked up on Twitter |
//! | `GET`    | `/handles/{id}` | `?related=topics,klout_scores` |
//! | `PUT`    | `/handles/{id}` | Body: `{"name"?, "camp_id"?}`; `camp_id: null` clears it |
//! | `DELETE` | `/handles/{id}` | 204 |
//! | `GET`    | `/handles/{id}/topics` | Topics attached to the handle |
//! | `POST`   | `/handles/{id}/topics/{topic_id}` | Attach; 200 with the topic |
//! | `DELETE` | `/handles/{id}/topics/{topic_id}` | Detach; 204 |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use dash_core::{
  Entity, ServiceError,
  model::{HandlePatch, HandleView, Id, NewHandle, Topic},
  query::{HandleQuery, HandleRelation, HandleSort, parse_choice, parse_filter, parse_relations},
  store::DashboardStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  error::ApiError,
  extract::{ApiJson, ApiPath, ListParams, RelatedParams, nullable, required},
};

fn not_found(id: Id) -> ApiError { dash_core::Error::not_found(Entity::Handle, id).into() }

async fn ensure_camp<S: DashboardStore>(state: &AppState<S>, camp_id: Id) -> Result<(), ApiError> {
  match state.store.get_camp(camp_id).await.map_err(ApiError::store)? {
    Some(_) => Ok(()),
    None => Err(dash_core::Error::not_found(Entity::Camp, camp_id).into()),
  }
}

// ─── List / get ──────────────────────────────────────────────────────────────

/// `GET /handles`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<HandleView>>, ApiError>
where
  S: DashboardStore,
{
  let query = HandleQuery {
    filter:    parse_filter(params.filter.as_deref())?,
    sort:      parse_choice("sort", params.sort.as_deref(), HandleSort::Id)?,
    order:     params.order()?,
    page:      params.page()?,
    relations: parse_relations(params.related.as_deref())?,
  };
  let handles = state.store.list_handles(&query).await.map_err(ApiError::store)?;
  Ok(Json(handles))
}

/// `GET /handles/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
  Query(params): Query<RelatedParams>,
) -> Result<Json<HandleView>, ApiError>
where
  S: DashboardStore,
{
  let relations: Vec<HandleRelation> = parse_relations(params.related.as_deref())?;
  let handle = state
    .store
    .get_handle(id, &relations)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(handle))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub username: String,
  pub camp_id:  Option<Id>,
}

/// `POST /handles`
///
/// Resolves the Twitter profile first; the Klout identity is best-effort and
/// a handle without one is simply never refreshed.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<Json<HandleView>, ApiError>
where
  S: DashboardStore,
{
  let username = required("username", body.username.trim().trim_start_matches('@'))?;
  if let Some(camp_id) = body.camp_id {
    ensure_camp(&state, camp_id).await?;
  }

  let profile = state.social.user_profile(&username).await.map_err(|e| match e {
    ServiceError::NotFound => ApiError::NotFound("Twitter user not found".into()),
    other => ApiError::upstream(other),
  })?;

  let klout_id = match state.influence.identity(&profile.username).await {
    Ok(Some(id)) => Some(id),
    Ok(None) => {
      tracing::info!(username = %profile.username, "no klout identity");
      None
    }
    Err(e) => {
      tracing::warn!(username = %profile.username, error = %e, "klout identity lookup failed");
      None
    }
  };

  let input = NewHandle {
    uid: profile.uid,
    username: profile.username,
    name: profile.name,
    profile: profile.profile,
    camp_id: body.camp_id,
    klout_id,
  };
  let handle = state.store.create_handle(input).await.map_err(ApiError::store)?;
  tracing::info!(handle_id = handle.id, username = %handle.username, "created handle");

  let view = state
    .store
    .get_handle(handle.id, &[])
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(handle.id))?;
  Ok(Json(view))
}

// ─── Update / delete ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub name:    Option<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub camp_id: Option<Option<Id>>,
}

/// `PUT /handles/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
  ApiJson(body): ApiJson<UpdateBody>,
) -> Result<Json<HandleView>, ApiError>
where
  S: DashboardStore,
{
  if let Some(Some(camp_id)) = body.camp_id {
    ensure_camp(&state, camp_id).await?;
  }
  let patch = HandlePatch {
    name:    body.name.as_deref().map(|n| required("name", n)).transpose()?,
    camp_id: body.camp_id,
  };
  state
    .store
    .update_handle(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;

  let view = state
    .store
    .get_handle(id, &[])
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(view))
}

/// `DELETE /handles/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
) -> Result<StatusCode, ApiError>
where
  S: DashboardStore,
{
  if !state.store.delete_handle(id).await.map_err(ApiError::store)? {
    return Err(not_found(id));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Topics ──────────────────────────────────────────────────────────────────

/// `GET /handles/{id}/topics`
pub async fn topics<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
) -> Result<Json<Vec<Topic>>, ApiError>
where
  S: DashboardStore,
{
  Ok(Json(state.store.handle_topics(id).await.map_err(ApiError::store)?))
}

/// `POST /handles/{id}/topics/{topic_id}`
pub async fn attach_topic<S>(
  State(state): State<AppState<S>>,
  ApiPath((id, topic_id)): ApiPath<(Id, Id)>,
) -> Result<Json<Topic>, ApiError>
where
  S: DashboardStore,
{
  let topic = state.store.attach_topic(id, topic_id).await.map_err(ApiError::store)?;
  tracing::info!(handle_id = id, topic_id, "attached topic");
  Ok(Json(topic))
}

/// `DELETE /handles/{id}/topics/{topic_id}`
pub async fn detach_topic<S>(
  State(state): State<AppState<S>>,
  ApiPath((id, topic_id)): ApiPath<(Id, Id)>,
) -> Result<StatusCode, ApiError>
where
  S: DashboardStore,
{
  state.store.detach_topic(id, topic_id).await.map_err(ApiError::store)?;
  tracing::info!(handle_id = id, topic_id, "detached topic");
  Ok(StatusCode::NO_CONTENT)
}
