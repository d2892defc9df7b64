//! The `DashboardStore` trait.
//!
//! Implemented by storage backends (e.g. `dash-store-sqlite`). The API crate
//! and the score-refresh job depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  Error,
  model::{
    Camp, Handle, HandlePatch, HandleView, Id, Infographic, KloutScore, NewCamp, NewHandle,
    NewInfographic, NewKloutScore, NewTopic, NewTweet, NewUser, Topic, TopicPatch, TopicView,
    Tweet, TweetFlag, TweetView, User, UserCredentials, UserPatch,
  },
  query::{HandleQuery, HandleRelation, TopicQuery, TopicRelation, TweetQuery, UserFilter, UserQuery},
};

/// Backend errors expose the domain error they carry, if any, so callers can
/// tell "not found" or "conflict" apart from infrastructure failures.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn as_domain(&self) -> Option<&Error>;
}

/// Abstraction over the dashboard's relational store.
///
/// Lookups by id return `Ok(None)` when the row is absent. Operations that
/// involve more than one row (relation management, score commits) report
/// missing rows as [`Error::NotFound`] through [`StoreError::as_domain`].
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers and spawned tasks.
pub trait DashboardStore: Send + Sync {
  type Error: StoreError;

  // ── Users ─────────────────────────────────────────────────────────────

  fn list_users<'a>(
    &'a self,
    query: &'a UserQuery,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  /// Number of users matching `filter`, ignoring pagination.
  fn count_users<'a>(
    &'a self,
    filter: &'a UserFilter,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  fn get_user(&self, id: Id) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Fails with [`Error::Conflict`] when the email is taken.
  fn create_user(&self, input: NewUser) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn update_user(
    &self,
    id: Id,
    patch: UserPatch,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Returns `false` if no such user existed.
  fn delete_user(&self, id: Id) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn user_credentials(
    &self,
    id: Id,
  ) -> impl Future<Output = Result<Option<UserCredentials>, Self::Error>> + Send + '_;

  fn set_password_reset(
    &self,
    id: Id,
    hash: Option<String>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Store a new password hash and clear any outstanding reset hash.
  fn set_password(
    &self,
    id: Id,
    hash: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Camps ─────────────────────────────────────────────────────────────

  fn list_camps(&self) -> impl Future<Output = Result<Vec<Camp>, Self::Error>> + Send + '_;

  fn get_camp(&self, id: Id) -> impl Future<Output = Result<Option<Camp>, Self::Error>> + Send + '_;

  fn create_camp(&self, input: NewCamp) -> impl Future<Output = Result<Camp, Self::Error>> + Send + '_;

  /// Dependent handles keep existing with `camp_id` set to null.
  fn delete_camp(&self, id: Id) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Handles ───────────────────────────────────────────────────────────

  fn list_handles<'a>(
    &'a self,
    query: &'a HandleQuery,
  ) -> impl Future<Output = Result<Vec<HandleView>, Self::Error>> + Send + 'a;

  /// Fetch one handle with `relations` expanded. The camp is always
  /// expanded.
  fn get_handle<'a>(
    &'a self,
    id: Id,
    relations: &'a [HandleRelation],
  ) -> impl Future<Output = Result<Option<HandleView>, Self::Error>> + Send + 'a;

  fn find_handle_by_uid(
    &self,
    uid: i64,
  ) -> impl Future<Output = Result<Option<Handle>, Self::Error>> + Send + '_;

  /// Fails with [`Error::Conflict`] when the uid or username is taken.
  fn create_handle(
    &self,
    input: NewHandle,
  ) -> impl Future<Output = Result<Handle, Self::Error>> + Send + '_;

  fn update_handle(
    &self,
    id: Id,
    patch: HandlePatch,
  ) -> impl Future<Output = Result<Option<Handle>, Self::Error>> + Send + '_;

  /// Cascades to topic links, score samples and tweets.
  fn delete_handle(&self, id: Id) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Topics attached to a handle; [`Error::NotFound`] if the handle is absent.
  fn handle_topics(&self, id: Id) -> impl Future<Output = Result<Vec<Topic>, Self::Error>> + Send + '_;

  /// Attach a topic and return it.
  ///
  /// Fails with [`Error::NotFound`] if either side is absent and
  /// [`Error::AlreadyAttached`] if the pairing exists.
  fn attach_topic(
    &self,
    handle_id: Id,
    topic_id: Id,
  ) -> impl Future<Output = Result<Topic, Self::Error>> + Send + '_;

  /// Fails with [`Error::NotFound`] if either side is absent and
  /// [`Error::NotAttached`] if there is no pairing to remove.
  fn detach_topic(
    &self,
    handle_id: Id,
    topic_id: Id,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Influence scores ──────────────────────────────────────────────────

  /// The handle with a known influence identity whose latest score sample
  /// is oldest. Never-sampled handles come first; ties go to the lowest id.
  fn next_refresh_candidate(
    &self,
  ) -> impl Future<Output = Result<Option<Handle>, Self::Error>> + Send + '_;

  /// Stamp a failed refresh attempt so the handle moves to the back of the
  /// queue.
  fn mark_refresh_attempt(&self, handle_id: Id) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Atomically cache `sample.value` on the handle, stamp the attempt, and
  /// append the sample.
  fn record_klout_score(
    &self,
    handle_id: Id,
    sample: NewKloutScore,
  ) -> impl Future<Output = Result<KloutScore, Self::Error>> + Send + '_;

  // ── Topics ────────────────────────────────────────────────────────────

  fn list_topics<'a>(
    &'a self,
    query: &'a TopicQuery,
  ) -> impl Future<Output = Result<Vec<TopicView>, Self::Error>> + Send + 'a;

  fn get_topic<'a>(
    &'a self,
    id: Id,
    relations: &'a [TopicRelation],
  ) -> impl Future<Output = Result<Option<TopicView>, Self::Error>> + Send + 'a;

  fn create_topic(&self, input: NewTopic) -> impl Future<Output = Result<Topic, Self::Error>> + Send + '_;

  fn update_topic(
    &self,
    id: Id,
    patch: TopicPatch,
  ) -> impl Future<Output = Result<Option<Topic>, Self::Error>> + Send + '_;

  fn delete_topic(&self, id: Id) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Handles tagged with a topic; [`Error::NotFound`] if the topic is absent.
  fn topic_handles(&self, id: Id) -> impl Future<Output = Result<Vec<Handle>, Self::Error>> + Send + '_;

  // ── Tweets ────────────────────────────────────────────────────────────

  fn list_tweets<'a>(
    &'a self,
    query: &'a TweetQuery,
  ) -> impl Future<Output = Result<Vec<TweetView>, Self::Error>> + Send + 'a;

  /// One tweet with its handle, parent and replies.
  fn get_tweet<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<TweetView>, Self::Error>> + Send + 'a;

  fn insert_tweet(&self, input: NewTweet) -> impl Future<Output = Result<Tweet, Self::Error>> + Send + '_;

  fn set_tweet_flag<'a>(
    &'a self,
    id: &'a str,
    flag: TweetFlag,
  ) -> impl Future<Output = Result<Option<Tweet>, Self::Error>> + Send + 'a;

  fn delete_tweet<'a>(&'a self, id: &'a str) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Infographics ──────────────────────────────────────────────────────

  fn list_infographics(&self) -> impl Future<Output = Result<Vec<Infographic>, Self::Error>> + Send + '_;

  fn get_infographic(
    &self,
    id: Id,
  ) -> impl Future<Output = Result<Option<Infographic>, Self::Error>> + Send + '_;

  /// Fails with [`Error::Conflict`] when the name is already registered.
  fn create_infographic(
    &self,
    input: NewInfographic,
  ) -> impl Future<Output = Result<Infographic, Self::Error>> + Send + '_;
}
