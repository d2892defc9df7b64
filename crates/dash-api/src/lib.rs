//! JSON REST API for the dashboard.
//!
//! Exposes an axum [`Router`] backed by any [`DashboardStore`] plus the
//! service adapters in [`AppState`]. Auth, TLS and CORS are the caller's
//! responsibility.

pub mod auth;
pub mod camps;
pub mod error;
pub mod extract;
pub mod handles;
pub mod infographics;
pub mod topics;
pub mod tweets;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use dash_core::{
  service::{FileStore, InfluenceService, Mailer, SocialService},
  store::DashboardStore,
};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:     Arc<S>,
  pub social:    Arc<dyn SocialService>,
  pub influence: Arc<dyn InfluenceService>,
  pub mailer:    Arc<dyn Mailer>,
  pub files:     Arc<dyn FileStore>,
  /// Base URL of the front end, used to build links in outgoing mail.
  pub front_url: Arc<str>,
}

// Manual impl: `S` itself need not be `Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:     self.store.clone(),
      social:    self.social.clone(),
      influence: self.influence.clone(),
      mailer:    self.mailer.clone(),
      files:     self.files.clone(),
      front_url: self.front_url.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: DashboardStore + 'static,
{
  Router::new()
    // Users
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route(
      "/users/{id}",
      get(users::get_one::<S>).put(users::update::<S>).delete(users::remove::<S>),
    )
    .route("/users/{id}/password", post(users::set_password::<S>))
    // Camps
    .route("/camps", get(camps::list::<S>).post(camps::create::<S>))
    .route("/camps/{id}", get(camps::get_one::<S>).delete(camps::remove::<S>))
    // Handles
    .route("/handles", get(handles::list::<S>).post(handles::create::<S>))
    .route(
      "/handles/{id}",
      get(handles::get_one::<S>).put(handles::update::<S>).delete(handles::remove::<S>),
    )
    .route("/handles/{id}/topics", get(handles::topics::<S>))
    .route(
      "/handles/{id}/topics/{topic_id}",
      post(handles::attach_topic::<S>).delete(handles::detach_topic::<S>),
    )
    // Topics
    .route("/topics", get(topics::list::<S>).post(topics::create::<S>))
    .route(
      "/topics/{id}",
      get(topics::get_one::<S>).put(topics::update::<S>).delete(topics::remove::<S>),
    )
    .route("/topics/{id}/handles", get(topics::handles::<S>))
    // Tweets
    .route(
      "/tweets",
      get(tweets::list::<S>)
        .post(tweets::create::<S>)
        .layer(DefaultBodyLimit::max(tweets::MAX_MEDIA_BYTES)),
    )
    .route("/tweets/{id}", get(tweets::get_one::<S>))
    .route("/tweets/{id}/retweet", post(tweets::retweet::<S>))
    .route("/tweets/{id}/favorite", post(tweets::favorite::<S>))
    .route("/tweets/{id}/unfavorite", post(tweets::unfavorite::<S>))
    // Infographics
    .route("/infographics", get(infographics::list::<S>).post(infographics::create::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
