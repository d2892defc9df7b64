//! Handlers for `/tweets` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tweets` | `maxId`, `userId` (handle uid), `topicId`, `limit`, `sortBy`, `sortOrder` |
//! | `POST` | `/tweets` | JSON `{"text", "replyStatusId"?, "infographicId"?}`, or multipart with an optional `file` (10 MB max) |
//! | `GET`  | `/tweets/{id}` | With `handle`, `parent` and `replies` |
//! | `POST` | `/tweets/{id}/retweet` | |
//! | `POST` | `/tweets/{id}/favorite` | |
//! | `POST` | `/tweets/{id}/unfavorite` | |
//!
//! Actions go upstream first; the local flag only changes once Twitter has
//! accepted them.

use axum::{
  Json,
  extract::{FromRequest, Multipart, Query, Request, State, multipart::MultipartError},
  http::{StatusCode, header},
};
use dash_core::{
  Entity, ServiceError,
  model::{Id, NewTweet, Tweet, TweetFlag, TweetView},
  query::{SortOrder, TweetQuery, TweetSort, parse_choice, parse_id, parse_positive},
  service::StatusUpdate,
  store::DashboardStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  error::ApiError,
  extract::{ApiJson, ApiPath, required},
};

const DEFAULT_LIMIT: u32 = 20;

fn not_found(id: &str) -> ApiError { dash_core::Error::not_found(Entity::Tweet, id).into() }

// ─── List / get ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineParams {
  pub max_id:     Option<String>,
  pub user_id:    Option<String>,
  pub topic_id:   Option<String>,
  pub limit:      Option<String>,
  pub sort_by:    Option<String>,
  pub sort_order: Option<String>,
}

impl TimelineParams {
  fn into_query(self) -> Result<TweetQuery, ApiError> {
    Ok(TweetQuery {
      max_id:     parse_id("maxId", self.max_id.as_deref())?,
      handle_uid: parse_id("userId", self.user_id.as_deref())?,
      topic_id:   parse_id("topicId", self.topic_id.as_deref())?,
      limit:      parse_positive("limit", self.limit.as_deref(), DEFAULT_LIMIT)?,
      sort:       parse_choice("sortBy", self.sort_by.as_deref(), TweetSort::Id)?,
      order:      parse_choice("sortOrder", self.sort_order.as_deref(), SortOrder::Desc)?,
    })
  }
}

/// `GET /tweets`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<TimelineParams>,
) -> Result<Json<Vec<TweetView>>, ApiError>
where
  S: DashboardStore,
{
  let query = params.into_query()?;
  Ok(Json(state.store.list_tweets(&query).await.map_err(ApiError::store)?))
}

/// `GET /tweets/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<String>,
) -> Result<Json<TweetView>, ApiError>
where
  S: DashboardStore,
{
  let tweet = state
    .store
    .get_tweet(&id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(&id))?;
  Ok(Json(tweet))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// Largest request body accepted on `POST /tweets`, media included.
pub const MAX_MEDIA_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub text:            String,
  pub reply_status_id: Option<String>,
  pub infographic_id:  Option<Id>,
  /// Media bytes from a multipart `file` part.
  #[serde(skip)]
  pub file:            Option<Vec<u8>>,
}

/// The body of `POST /tweets`, sent as JSON or as `multipart/form-data`.
/// Multipart fields carry the same names as the JSON keys plus `file`.
pub struct TweetForm(pub CreateBody);

impl<S> FromRequest<S> for TweetForm
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let is_multipart = req
      .headers()
      .get(header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|ct| ct.starts_with("multipart/form-data"));
    if !is_multipart {
      let ApiJson(body) = ApiJson::<CreateBody>::from_request(req, state).await?;
      return Ok(TweetForm(body));
    }

    let mut form = Multipart::from_request(req, state)
      .await
      .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut body = CreateBody {
      text:            String::new(),
      reply_status_id: None,
      infographic_id:  None,
      file:            None,
    };
    while let Some(field) = form.next_field().await.map_err(multipart_error)? {
      let name = field.name().unwrap_or_default().to_owned();
      match name.as_str() {
        "text" => body.text = field.text().await.map_err(multipart_error)?,
        "replyStatusId" => body.reply_status_id = Some(field.text().await.map_err(multipart_error)?),
        "infographicId" => {
          let raw = field.text().await.map_err(multipart_error)?;
          body.infographic_id = parse_id("infographicId", Some(&raw))?;
        }
        // Browsers send an empty part when no file was picked.
        "file" => {
          let bytes = field.bytes().await.map_err(multipart_error)?;
          body.file = (!bytes.is_empty()).then(|| bytes.to_vec());
        }
        other => tracing::debug!(field = other, "ignoring multipart field"),
      }
    }
    Ok(TweetForm(body))
  }
}

fn multipart_error(e: MultipartError) -> ApiError {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    return ApiError::TooLarge(format!("Payload must be at most {MAX_MEDIA_BYTES} bytes"));
  }
  ApiError::BadRequest(e.body_text())
}

/// Media bytes to attach: the uploaded file, else the infographic's file.
async fn media_bytes<S: DashboardStore>(
  state: &AppState<S>,
  body: &mut CreateBody,
) -> Result<Option<Vec<u8>>, ApiError> {
  if let Some(file) = body.file.take() {
    return Ok(Some(file));
  }
  let Some(infographic_id) = body.infographic_id else {
    return Ok(None);
  };
  let infographic = state
    .store
    .get_infographic(infographic_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::from(dash_core::Error::not_found(Entity::Infographic, infographic_id)))?;
  let bytes = state.files.fetch(&infographic.name).await.map_err(|e| match e {
    ServiceError::NotFound => ApiError::NotFound("File not found".into()),
    other => ApiError::upstream(other),
  })?;
  Ok(Some(bytes))
}

/// `POST /tweets`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  TweetForm(mut body): TweetForm,
) -> Result<Json<TweetView>, ApiError>
where
  S: DashboardStore,
{
  let text = required("text", &body.text)?;

  let mut media_ids = Vec::new();
  if let Some(bytes) = media_bytes(&state, &mut body).await? {
    tracing::debug!(size = bytes.len(), "uploading tweet media");
    media_ids.push(state.social.upload_media(bytes).await.map_err(ApiError::upstream)?);
  }

  let update = StatusUpdate {
    text,
    in_reply_to: body.reply_status_id.filter(|id| !id.trim().is_empty()),
    media_ids,
  };
  let posted = state.social.update_status(update).await.map_err(ApiError::upstream)?;

  let handle = state
    .store
    .find_handle_by_uid(posted.author_uid)
    .await
    .map_err(ApiError::store)?;
  let input = NewTweet {
    id:         posted.id,
    handle_id:  handle.as_ref().map(|h| h.id),
    parent_id:  posted.in_reply_to,
    text:       posted.text,
    created_at: posted.created_at,
  };
  let tweet = state.store.insert_tweet(input).await.map_err(ApiError::store)?;
  tracing::info!(tweet_id = %tweet.id, "posted tweet");

  let view = state
    .store
    .get_tweet(&tweet.id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(&tweet.id))?;
  Ok(Json(view))
}

// ─── Actions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Action {
  Retweet,
  Favorite,
  Unfavorite,
}

impl Action {
  fn flag(self) -> TweetFlag {
    match self {
      Action::Retweet => TweetFlag::Retweeted(true),
      Action::Favorite => TweetFlag::Favorited(true),
      Action::Unfavorite => TweetFlag::Favorited(false),
    }
  }
}

async fn apply<S: DashboardStore>(
  state: &AppState<S>,
  id: &str,
  action: Action,
) -> Result<Json<Tweet>, ApiError> {
  if state.store.get_tweet(id).await.map_err(ApiError::store)?.is_none() {
    return Err(not_found(id));
  }

  let result = match action {
    Action::Retweet => state.social.retweet(id).await,
    Action::Favorite => state.social.favorite(id).await,
    Action::Unfavorite => state.social.unfavorite(id).await,
  };
  match result {
    Ok(()) | Err(ServiceError::AlreadyRetweeted) => {}
    Err(ServiceError::TweetDeleted) => {
      state.store.delete_tweet(id).await.map_err(ApiError::store)?;
      tracing::info!(tweet_id = %id, "tweet deleted upstream, removed locally");
      return Err(ApiError::BadRequest("Tweet deleted".into()));
    }
    Err(e) => return Err(ApiError::upstream(e)),
  }

  let tweet = state
    .store
    .set_tweet_flag(id, action.flag())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  tracing::debug!(tweet_id = %id, ?action, "tweet action applied");
  Ok(Json(tweet))
}

/// `POST /tweets/{id}/retweet`
pub async fn retweet<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<String>,
) -> Result<Json<Tweet>, ApiError>
where
  S: DashboardStore,
{
  apply(&state, &id, Action::Retweet).await
}

/// `POST /tweets/{id}/favorite`
pub async fn favorite<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<String>,
) -> Result<Json<Tweet>, ApiError>
where
  S: DashboardStore,
{
  apply(&state, &id, Action::Favorite).await
}

/// `POST /tweets/{id}/unfavorite`
pub async fn unfavorite<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<String>,
) -> Result<Json<Tweet>, ApiError>
where
  S: DashboardStore,
{
  apply(&state, &id, Action::Unfavorite).await
}
