//! Handlers for `/users` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/users` | `filter`, `sort`, `sortOrder`, `page`, `pageSize`; returns `{users, count}` |
//! | `POST`   | `/users` | Body: `{"email": "...", "name": "..."}`; mails a set-password link |
//! | `GET`    | `/users/{id}` | 404 if not found |
//! | `PUT`    | `/users/{id}` | Body: `{"email"?, "name"?}`; `name: null` clears it |
//! | `DELETE` | `/users/{id}` | 204 |
//! | `POST`   | `/users/{id}/password` | Body: `{"token", "password"}`; 204 |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use dash_core::{
  Entity,
  model::{Id, NewUser, User, UserPatch},
  query::{UserQuery, UserSort, parse_choice, parse_filter},
  service::Email,
  store::DashboardStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
  AppState,
  auth::{generate_token, hash_secret, verify_secret},
  error::ApiError,
  extract::{ApiJson, ApiPath, ListParams, nullable, required},
};

const MIN_PASSWORD_LEN: usize = 8;

fn not_found(id: Id) -> ApiError { dash_core::Error::not_found(Entity::User, id).into() }

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UserList {
  pub users: Vec<User>,
  /// Total matching the filter, ignoring pagination.
  pub count: u64,
}

/// `GET /users`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<UserList>, ApiError>
where
  S: DashboardStore,
{
  let query = UserQuery {
    filter: parse_filter(params.filter.as_deref())?,
    sort:   parse_choice("sort", params.sort.as_deref(), UserSort::Name)?,
    order:  params.order()?,
    page:   params.page()?,
  };
  let users = state.store.list_users(&query).await.map_err(ApiError::store)?;
  let count = state.store.count_users(&query.filter).await.map_err(ApiError::store)?;
  Ok(Json(UserList { users, count }))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub email: String,
  pub name:  Option<String>,
}

fn valid_email(email: &str) -> Result<String, ApiError> {
  let email = required("email", email)?;
  match email.split_once('@') {
    Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email.to_lowercase()),
    _ => Err(dash_core::Error::validation("email", "[\"email\" must be a valid email]").into()),
  }
}

/// `POST /users`
///
/// The account starts with a random password nobody knows; the user picks a
/// real one through the emailed link. If that mail cannot be sent the request
/// fails with 502, though the account stays created.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<Json<User>, ApiError>
where
  S: DashboardStore,
{
  let email = valid_email(&body.email)?;
  let token = generate_token();
  let input = NewUser {
    email,
    name: body.name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()),
    password: hash_secret(&generate_token())?,
    password_reset: Some(hash_secret(&token)?),
  };
  let user = state.store.create_user(input).await.map_err(ApiError::store)?;
  tracing::info!(user_id = user.id, email = %user.email, "created user");

  let url = format!(
    "{}/set-password/{}?token={token}",
    state.front_url.trim_end_matches('/'),
    user.id
  );
  let email = Email {
    to:       user.email.clone(),
    subject:  "Set your dashboard password".into(),
    template: "set-password".into(),
    context:  json!({ "name": user.name, "url": url }),
  };
  state.mailer.send(email).await.map_err(|e| {
    tracing::error!(user_id = user.id, error = %e, "sending set-password mail failed");
    ApiError::upstream(e)
  })?;

  Ok(Json(user))
}

// ─── Get / update / delete ───────────────────────────────────────────────────

/// `GET /users/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
) -> Result<Json<User>, ApiError>
where
  S: DashboardStore,
{
  let user = state
    .store
    .get_user(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub email: Option<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub name:  Option<Option<String>>,
}

/// `PUT /users/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
  ApiJson(body): ApiJson<UpdateBody>,
) -> Result<Json<User>, ApiError>
where
  S: DashboardStore,
{
  let patch = UserPatch {
    email: body.email.as_deref().map(valid_email).transpose()?,
    name:  body.name,
  };
  let user = state
    .store
    .update_user(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(user))
}

/// `DELETE /users/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
) -> Result<StatusCode, ApiError>
where
  S: DashboardStore,
{
  if !state.store.delete_user(id).await.map_err(ApiError::store)? {
    return Err(not_found(id));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Password ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PasswordBody {
  pub token:    String,
  pub password: String,
}

/// `POST /users/{id}/password`: redeem a reset token.
pub async fn set_password<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Id>,
  ApiJson(body): ApiJson<PasswordBody>,
) -> Result<StatusCode, ApiError>
where
  S: DashboardStore,
{
  if body.password.chars().count() < MIN_PASSWORD_LEN {
    return Err(
      dash_core::Error::validation(
        "password",
        format!("[\"password\" length must be at least {MIN_PASSWORD_LEN} characters long]"),
      )
      .into(),
    );
  }

  let creds = state
    .store
    .user_credentials(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  let valid = creds
    .password_reset
    .as_deref()
    .is_some_and(|hash| verify_secret(&body.token, hash));
  if !valid {
    return Err(ApiError::BadRequest("Invalid token".into()));
  }

  state
    .store
    .set_password(id, hash_secret(&body.password)?)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(user_id = id, "password set");
  Ok(StatusCode::NO_CONTENT)
}
