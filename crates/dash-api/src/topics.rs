//! Handlers for `/topics` endpoints.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use dash_core::{
  Entity,
  model::{Handle, Id, NewTopic, Topic, TopicPatch, TopicView},
  query::{TopicQuery, TopicRelation, TopicSort, parse_choice, parse_filter, parse_relations},
  store::DashboardStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  error::ApiError,
  extract::{ApiJson, ApiPath, ListParams, RelatedParams, nullable, required},
};

fn not_found(id: Id) -> ApiError { dash_core::Error::not_found(Entity::Topic, id).into() }

/// Trimmed, non-empty keywords in their original order.
fn clean_keywords(keywords: Vec<String>) -> Vec<String> {
  keywords
    .into_iter()
    .map(|k| k.trim().to_owned())
    .filter(|k| !k.is_empty())
    .collect()
}

/// `GET /topics`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<TopicView>>, ApiError>
where
  S: DashboardStore,
{
  let query = TopicQuery {
    filter:    parse_filter(params.filter.as_deref())?,
    sort:      parse_choice("sort", params.sort.as_deref(), TopicSort::Id)?,
    order:     params.order()?,
    page:      params.page()?,
    relations: parse_relations(params.related.as_deref())?,
  };
  Ok(Json(state.store.list_topics(&query).await.map_err(ApiError::store)?))
}

/// `GET /topics/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
  Query(params): Query<RelatedParams>,
) -> Result<Json<TopicView>, ApiError>
where
  S: DashboardStore,
{
  let relations: Vec<TopicRelation> = parse_relations(params.related.as_deref())?;
  let topic = state
    .store
    .get_topic(id, &relations)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(topic))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:        String,
  pub description: Option<String>,
  #[serde(default)]
  pub keywords:    Vec<String>,
}

/// `POST /topics`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<Json<Topic>, ApiError>
where
  S: DashboardStore,
{
  let input = NewTopic {
    name:        required("name", &body.name)?,
    description: body.description,
    keywords:    clean_keywords(body.keywords),
  };
  let topic = state.store.create_topic(input).await.map_err(ApiError::store)?;
  tracing::info!(topic_id = topic.id, name = %topic.name, "created topic");
  Ok(Json(topic))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub name:        Option<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub description: Option<Option<String>>,
  pub keywords:    Option<Vec<String>>,
}

/// `PUT /topics/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
  ApiJson(body): ApiJson<UpdateBody>,
) -> Result<Json<Topic>, ApiError>
where
  S: DashboardStore,
{
  let patch = TopicPatch {
    name:        body.name.as_deref().map(|n| required("name", n)).transpose()?,
    description: body.description,
    keywords:    body.keywords.map(clean_keywords),
  };
  let topic = state
    .store
    .update_topic(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(topic))
}

/// `DELETE /topics/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
) -> Result<StatusCode, ApiError>
where
  S: DashboardStore,
{
  if !state.store.delete_topic(id).await.map_err(ApiError::store)? {
    return Err(not_found(id));
  }
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /topics/{id}/handles`
pub async fn handles<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
) -> Result<Json<Vec<Handle>>, ApiError>
where
  S: DashboardStore,
{
  Ok(Json(state.store.topic_handles(id).await.map_err(ApiError::store)?))
}
