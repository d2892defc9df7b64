//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use dash_core::{
  Entity,
  model::{
    HandlePatch, NewCamp, NewHandle, NewInfographic, NewKloutScore, NewTopic, NewTweet, NewUser,
    TopicPatch, TweetFlag, UserPatch,
  },
  query::{
    HandleFilter, HandleQuery, HandleRelation, HandleSort, Page, SortOrder, TopicQuery,
    TopicRelation, TweetQuery, UserFilter, UserQuery, UserSort,
  },
  store::{DashboardStore, StoreError},
};

use crate::{Error, LATEST_VERSION, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_handle(uid: i64, username: &str, name: &str) -> NewHandle {
  NewHandle {
    uid,
    username: username.into(),
    name: name.into(),
    profile: serde_json::json!({ "screen_name": username }),
    camp_id: None,
    klout_id: None,
  }
}

fn new_topic(name: &str) -> NewTopic {
  NewTopic { name: name.into(), description: None, keywords: vec![name.to_lowercase()] }
}

fn sample(value: f64) -> NewKloutScore {
  NewKloutScore { value, delta_day: 0.5, delta_week: 1.0, delta_month: -2.0 }
}

fn domain(err: &Error) -> &dash_core::Error {
  err.as_domain().expect("domain error")
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_store_is_at_latest_version() {
  let s = store().await;
  assert_eq!(s.schema_version().await.unwrap(), LATEST_VERSION);
}

#[tokio::test]
async fn migrations_roll_back_and_forward() {
  let s = store().await;
  s.migrate_to(1).await.unwrap();
  assert_eq!(s.schema_version().await.unwrap(), 1);

  s.migrate_to(0).await.unwrap();
  assert_eq!(s.schema_version().await.unwrap(), 0);

  s.migrate_to(LATEST_VERSION).await.unwrap();
  let handle = s.create_handle(new_handle(1, "tw1", "Test One")).await.unwrap();
  assert!(handle.klout_score.is_none());
}

#[tokio::test]
async fn unknown_version_is_rejected() {
  let s = store().await;
  let err = s.migrate_to(LATEST_VERSION + 1).await.unwrap_err();
  assert!(matches!(err, Error::UnknownVersion(v) if v == LATEST_VERSION + 1));
}

// ─── Users ───────────────────────────────────────────────────────────────────

fn new_user(email: &str, name: &str) -> NewUser {
  NewUser {
    email:          email.into(),
    name:           Some(name.into()),
    password:       "$argon2id$stub".into(),
    password_reset: None,
  }
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
  let s = store().await;
  s.create_user(new_user("a@example.com", "Alice")).await.unwrap();
  let err = s.create_user(new_user("a@example.com", "Other")).await.unwrap_err();
  match domain(&err) {
    dash_core::Error::Conflict(msg) => assert_eq!(msg, "Email already in use."),
    other => panic!("expected conflict, got {other:?}"),
  }
}

#[tokio::test]
async fn users_sort_search_and_count() {
  let s = store().await;
  s.create_user(new_user("carol@example.com", "Carol")).await.unwrap();
  s.create_user(new_user("alice@example.com", "Alice")).await.unwrap();
  s.create_user(new_user("bob@example.org", "Bob")).await.unwrap();

  let all = s.list_users(&UserQuery::default()).await.unwrap();
  let names: Vec<_> = all.iter().filter_map(|u| u.name.as_deref()).collect();
  assert_eq!(names, ["Alice", "Bob", "Carol"]);

  let query = UserQuery {
    filter: UserFilter { search: Some("example.com".into()) },
    sort: UserSort::Email,
    order: SortOrder::Desc,
    ..Default::default()
  };
  let found = s.list_users(&query).await.unwrap();
  let emails: Vec<_> = found.iter().map(|u| u.email.as_str()).collect();
  assert_eq!(emails, ["carol@example.com", "alice@example.com"]);
  assert_eq!(s.count_users(&query.filter).await.unwrap(), 2);
  assert_eq!(s.count_users(&UserFilter::default()).await.unwrap(), 3);
}

#[tokio::test]
async fn password_reset_flow_clears_the_token() {
  let s = store().await;
  let user = s.create_user(new_user("a@example.com", "Alice")).await.unwrap();

  assert!(s.set_password_reset(user.id, Some("reset-hash".into())).await.unwrap());
  let creds = s.user_credentials(user.id).await.unwrap().unwrap();
  assert_eq!(creds.password_reset.as_deref(), Some("reset-hash"));

  assert!(s.set_password(user.id, "new-hash".into()).await.unwrap());
  let creds = s.user_credentials(user.id).await.unwrap().unwrap();
  assert_eq!(creds.password.as_deref(), Some("new-hash"));
  assert!(creds.password_reset.is_none());

  assert!(!s.set_password(9999, "x".into()).await.unwrap());
}

#[tokio::test]
async fn update_user_can_clear_name() {
  let s = store().await;
  let user = s.create_user(new_user("a@example.com", "Alice")).await.unwrap();
  let patch = UserPatch { email: Some("alice@example.com".into()), name: Some(None) };
  let updated = s.update_user(user.id, patch).await.unwrap().unwrap();
  assert_eq!(updated.email, "alice@example.com");
  assert!(updated.name.is_none());

  assert!(s.update_user(9999, UserPatch::default()).await.unwrap().is_none());
  assert!(s.delete_user(user.id).await.unwrap());
  assert!(s.get_user(user.id).await.unwrap().is_none());
}

// ─── Handles and camps ───────────────────────────────────────────────────────

#[tokio::test]
async fn handle_reads_always_include_camp() {
  let s = store().await;
  let camp = s
    .create_camp(NewCamp { name: "Blue".into(), description: None })
    .await
    .unwrap();
  let mut input = new_handle(1, "tw1", "Test One");
  input.camp_id = Some(camp.id);
  let handle = s.create_handle(input).await.unwrap();

  let view = s.get_handle(handle.id, &[]).await.unwrap().unwrap();
  assert_eq!(view.camp.map(|c| c.name), Some("Blue".to_owned()));
  assert!(view.topics.is_none());
  assert_eq!(view.handle.profile["screen_name"], "tw1");
}

#[tokio::test]
async fn deleting_a_camp_detaches_its_handles() {
  let s = store().await;
  let camp = s
    .create_camp(NewCamp { name: "Blue".into(), description: None })
    .await
    .unwrap();
  let mut input = new_handle(1, "tw1", "Test One");
  input.camp_id = Some(camp.id);
  let handle = s.create_handle(input).await.unwrap();

  assert!(s.delete_camp(camp.id).await.unwrap());
  let view = s.get_handle(handle.id, &[]).await.unwrap().unwrap();
  assert!(view.handle.camp_id.is_none());
  assert!(view.camp.is_none());
  assert!(!s.delete_camp(camp.id).await.unwrap());
}

#[tokio::test]
async fn duplicate_uid_is_a_conflict() {
  let s = store().await;
  s.create_handle(new_handle(1, "tw1", "Test One")).await.unwrap();
  let err = s.create_handle(new_handle(1, "other", "Other")).await.unwrap_err();
  assert!(matches!(domain(&err), dash_core::Error::Conflict(_)));
}

#[tokio::test]
async fn update_handle_applies_patch() {
  let s = store().await;
  let camp = s
    .create_camp(NewCamp { name: "Blue".into(), description: None })
    .await
    .unwrap();
  let handle = s.create_handle(new_handle(1, "tw1", "Test One")).await.unwrap();

  let patch = HandlePatch { name: Some("Renamed".into()), camp_id: Some(Some(camp.id)) };
  let updated = s.update_handle(handle.id, patch).await.unwrap().unwrap();
  assert_eq!(updated.name, "Renamed");
  assert_eq!(updated.camp_id, Some(camp.id));

  let patch = HandlePatch { name: None, camp_id: Some(None) };
  let updated = s.update_handle(handle.id, patch).await.unwrap().unwrap();
  assert_eq!(updated.name, "Renamed");
  assert!(updated.camp_id.is_none());
}

#[tokio::test]
async fn list_handles_searches_name_and_username() {
  let s = store().await;
  s.create_handle(new_handle(1, "test1", "Test One")).await.unwrap();
  s.create_handle(new_handle(2, "test2", "Test Two")).await.unwrap();

  let query = HandleQuery {
    filter: HandleFilter { search: Some("tw".into()), ..Default::default() },
    ..Default::default()
  };
  let found = s.list_handles(&query).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].handle.username, "test2");
}

#[tokio::test]
async fn list_handles_sorts_by_score_and_paginates() {
  let s = store().await;
  for (uid, name, score) in [(1, "low", 10.0), (2, "high", 80.0), (3, "mid", 40.0)] {
    let h = s.create_handle(new_handle(uid, name, name)).await.unwrap();
    s.record_klout_score(h.id, sample(score)).await.unwrap();
  }

  let query = HandleQuery {
    sort: HandleSort::KloutScore,
    order: SortOrder::Desc,
    ..Default::default()
  };
  let names: Vec<_> = s
    .list_handles(&query)
    .await
    .unwrap()
    .into_iter()
    .map(|v| v.handle.username)
    .collect();
  assert_eq!(names, ["high", "mid", "low"]);

  let query = HandleQuery { page: Page { page: 2, page_size: 1 }, ..query };
  let page = s.list_handles(&query).await.unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].handle.username, "mid");
}

// ─── Topic relations ─────────────────────────────────────────────────────────

#[tokio::test]
async fn attach_and_detach_topics() {
  let s = store().await;
  let handle = s.create_handle(new_handle(1, "tw1", "Test One")).await.unwrap();
  let topic = s.create_topic(new_topic("Energy")).await.unwrap();

  let attached = s.attach_topic(handle.id, topic.id).await.unwrap();
  assert_eq!(attached.id, topic.id);

  let err = s.attach_topic(handle.id, topic.id).await.unwrap_err();
  assert!(matches!(domain(&err), dash_core::Error::AlreadyAttached));

  let topics = s.handle_topics(handle.id).await.unwrap();
  assert_eq!(topics.len(), 1);
  let handles = s.topic_handles(topic.id).await.unwrap();
  assert_eq!(handles.len(), 1);

  let view = s
    .get_handle(handle.id, &[HandleRelation::Topics])
    .await
    .unwrap()
    .unwrap();
  assert_eq!(view.topics.map(|t| t.len()), Some(1));

  s.detach_topic(handle.id, topic.id).await.unwrap();
  let err = s.detach_topic(handle.id, topic.id).await.unwrap_err();
  assert!(matches!(domain(&err), dash_core::Error::NotAttached));
  assert!(s.handle_topics(handle.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn relation_changes_report_missing_rows() {
  let s = store().await;
  let handle = s.create_handle(new_handle(1, "tw1", "Test One")).await.unwrap();
  let topic = s.create_topic(new_topic("Energy")).await.unwrap();

  let err = s.attach_topic(9999, topic.id).await.unwrap_err();
  assert!(matches!(
    domain(&err),
    dash_core::Error::NotFound { entity: Entity::Handle, .. }
  ));
  let err = s.attach_topic(handle.id, 9999).await.unwrap_err();
  assert!(matches!(
    domain(&err),
    dash_core::Error::NotFound { entity: Entity::Topic, .. }
  ));
  let err = s.detach_topic(handle.id, 9999).await.unwrap_err();
  assert_eq!(domain(&err).to_string(), "Topic not found");
  let err = s.handle_topics(9999).await.unwrap_err();
  assert_eq!(domain(&err).to_string(), "Handle not found");
}

#[tokio::test]
async fn deleting_either_side_drops_the_link() {
  let s = store().await;
  let handle = s.create_handle(new_handle(1, "tw1", "Test One")).await.unwrap();
  let energy = s.create_topic(new_topic("Energy")).await.unwrap();
  let water = s.create_topic(new_topic("Water")).await.unwrap();
  s.attach_topic(handle.id, energy.id).await.unwrap();
  s.attach_topic(handle.id, water.id).await.unwrap();

  assert!(s.delete_topic(energy.id).await.unwrap());
  let topics = s.handle_topics(handle.id).await.unwrap();
  assert_eq!(topics.iter().map(|t| t.id).collect::<Vec<_>>(), [water.id]);

  assert!(s.delete_handle(handle.id).await.unwrap());
  assert!(s.topic_handles(water.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn pages_past_the_end_are_empty_or_rejected() {
  let s = store().await;
  s.create_topic(new_topic("Energy")).await.unwrap();

  let far = TopicQuery { page: Page { page: u32::MAX, page_size: 1 }, ..Default::default() };
  assert!(s.list_topics(&far).await.unwrap().is_empty());

  let overflow =
    TopicQuery { page: Page { page: u32::MAX, page_size: u32::MAX }, ..Default::default() };
  let err = s.list_topics(&overflow).await.unwrap_err();
  assert!(matches!(domain(&err), dash_core::Error::Validation { field: "page", .. }));

  let users = UserQuery { page: Page { page: u32::MAX, page_size: u32::MAX }, ..Default::default() };
  assert!(s.list_users(&users).await.is_err());
}

#[tokio::test]
async fn topics_expand_handles_on_request() {
  let s = store().await;
  let handle = s.create_handle(new_handle(1, "tw1", "Test One")).await.unwrap();
  let topic = s.create_topic(new_topic("Energy")).await.unwrap();
  s.attach_topic(handle.id, topic.id).await.unwrap();

  let query = TopicQuery { relations: vec![TopicRelation::Handles], ..Default::default() };
  let topics = s.list_topics(&query).await.unwrap();
  assert_eq!(topics[0].handles.as_ref().map(Vec::len), Some(1));

  let bare = s.get_topic(topic.id, &[]).await.unwrap().unwrap();
  assert!(bare.handles.is_none());
  assert_eq!(bare.topic.keywords, ["energy"]);

  let patch = TopicPatch {
    keywords: Some(vec!["solar".into(), "wind".into()]),
    description: Some(Some("Renewables".into())),
    ..Default::default()
  };
  let updated = s.update_topic(topic.id, patch).await.unwrap().unwrap();
  assert_eq!(updated.keywords, ["solar", "wind"]);
  assert_eq!(updated.description.as_deref(), Some("Renewables"));
  assert_eq!(updated.name, "Energy");
}

// ─── Score refresh ───────────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_skips_handles_without_identity() {
  let s = store().await;
  s.create_handle(new_handle(1, "tw1", "Test One")).await.unwrap();
  assert!(s.next_refresh_candidate().await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_prefers_never_checked_then_oldest() {
  let s = store().await;
  let mut a = new_handle(1, "a", "A");
  a.klout_id = Some("k-a".into());
  let mut b = new_handle(2, "b", "B");
  b.klout_id = Some("k-b".into());
  let a = s.create_handle(a).await.unwrap();
  let b = s.create_handle(b).await.unwrap();

  // B has been checked; A never has.
  s.record_klout_score(b.id, sample(30.0)).await.unwrap();
  let next = s.next_refresh_candidate().await.unwrap().unwrap();
  assert_eq!(next.id, a.id);

  tokio::time::sleep(Duration::from_millis(5)).await;
  s.record_klout_score(a.id, sample(20.0)).await.unwrap();
  let next = s.next_refresh_candidate().await.unwrap().unwrap();
  assert_eq!(next.id, b.id);
}

#[tokio::test]
async fn failed_attempts_still_rotate_the_queue() {
  let s = store().await;
  let mut a = new_handle(1, "a", "A");
  a.klout_id = Some("k-a".into());
  let mut b = new_handle(2, "b", "B");
  b.klout_id = Some("k-b".into());
  let a = s.create_handle(a).await.unwrap();
  let b = s.create_handle(b).await.unwrap();

  assert_eq!(s.next_refresh_candidate().await.unwrap().unwrap().id, a.id);
  s.mark_refresh_attempt(a.id).await.unwrap();
  assert_eq!(s.next_refresh_candidate().await.unwrap().unwrap().id, b.id);

  let err = s.mark_refresh_attempt(9999).await.unwrap_err();
  assert!(matches!(domain(&err), dash_core::Error::NotFound { .. }));
}

#[tokio::test]
async fn recording_a_score_caches_it_on_the_handle() {
  let s = store().await;
  let handle = s.create_handle(new_handle(1, "tw1", "Test One")).await.unwrap();
  let recorded = s.record_klout_score(handle.id, sample(55.5)).await.unwrap();
  assert_eq!(recorded.value, 55.5);
  assert_eq!(recorded.delta_month, -2.0);

  let view = s
    .get_handle(handle.id, &[HandleRelation::KloutScores])
    .await
    .unwrap()
    .unwrap();
  assert_eq!(view.handle.klout_score, Some(55.5));
  assert!(view.handle.klout_checked_at.is_some());
  assert_eq!(view.klout_scores.map(|k| k.len()), Some(1));

  let err = s.record_klout_score(9999, sample(1.0)).await.unwrap_err();
  assert!(matches!(domain(&err), dash_core::Error::NotFound { .. }));
}

// ─── Tweets ──────────────────────────────────────────────────────────────────

fn new_tweet(id: &str, handle_id: i64, parent_id: Option<&str>) -> NewTweet {
  NewTweet {
    id: id.into(),
    handle_id: Some(handle_id),
    parent_id: parent_id.map(Into::into),
    text: format!("status {id}"),
    created_at: Utc.with_ymd_and_hms(2016, 9, 20, 10, 0, 0).unwrap(),
  }
}

#[tokio::test]
async fn tweets_filter_by_max_id_handle_and_topic() {
  let s = store().await;
  let one = s.create_handle(new_handle(101, "tw1", "Test One")).await.unwrap();
  let two = s.create_handle(new_handle(202, "tw2", "Test Two")).await.unwrap();
  let topic = s.create_topic(new_topic("Energy")).await.unwrap();
  s.attach_topic(two.id, topic.id).await.unwrap();

  s.insert_tweet(new_tweet("9", one.id, None)).await.unwrap();
  s.insert_tweet(new_tweet("10", one.id, None)).await.unwrap();
  s.insert_tweet(new_tweet("11", two.id, None)).await.unwrap();

  // Numeric, not lexical, ordering of ids.
  let all = s.list_tweets(&TweetQuery::default()).await.unwrap();
  let ids: Vec<_> = all.iter().map(|t| t.tweet.id.as_str()).collect();
  assert_eq!(ids, ["11", "10", "9"]);
  assert!(all.iter().all(|t| t.handle.is_some()));

  let query = TweetQuery { max_id: Some(10), ..Default::default() };
  assert_eq!(s.list_tweets(&query).await.unwrap().len(), 2);

  let query = TweetQuery { handle_uid: Some(202), ..Default::default() };
  let by_handle = s.list_tweets(&query).await.unwrap();
  assert_eq!(by_handle.len(), 1);
  assert_eq!(by_handle[0].tweet.id, "11");

  let query = TweetQuery { topic_id: Some(topic.id), limit: 5, ..Default::default() };
  assert_eq!(s.list_tweets(&query).await.unwrap().len(), 1);

  let query = TweetQuery { limit: 1, order: SortOrder::Asc, ..Default::default() };
  let first = s.list_tweets(&query).await.unwrap();
  assert_eq!(first[0].tweet.id, "9");
}

#[tokio::test]
async fn tweet_detail_has_parent_and_replies() {
  let s = store().await;
  let handle = s.create_handle(new_handle(101, "tw1", "Test One")).await.unwrap();
  s.insert_tweet(new_tweet("1", handle.id, None)).await.unwrap();
  s.insert_tweet(new_tweet("2", handle.id, Some("1"))).await.unwrap();
  s.insert_tweet(new_tweet("3", handle.id, Some("2"))).await.unwrap();

  let view = s.get_tweet("2").await.unwrap().unwrap();
  assert_eq!(view.parent.map(|p| p.id), Some("1".to_owned()));
  let replies = view.replies.unwrap();
  assert_eq!(replies.len(), 1);
  assert_eq!(replies[0].id, "3");
  assert_eq!(view.handle.map(|h| h.id), Some(handle.id));

  assert!(s.get_tweet("404").await.unwrap().is_none());
}

#[tokio::test]
async fn tweet_flags_and_deletion() {
  let s = store().await;
  let handle = s.create_handle(new_handle(101, "tw1", "Test One")).await.unwrap();
  s.insert_tweet(new_tweet("1", handle.id, None)).await.unwrap();

  let tweet = s.set_tweet_flag("1", TweetFlag::Retweeted(true)).await.unwrap().unwrap();
  assert!(tweet.retweeted);
  assert!(!tweet.favorited);
  let tweet = s.set_tweet_flag("1", TweetFlag::Favorited(true)).await.unwrap().unwrap();
  assert!(tweet.favorited);
  assert!(s.set_tweet_flag("2", TweetFlag::Favorited(true)).await.unwrap().is_none());

  let err = s.insert_tweet(new_tweet("1", handle.id, None)).await.unwrap_err();
  assert!(matches!(domain(&err), dash_core::Error::Conflict(_)));

  assert!(s.delete_tweet("1").await.unwrap());
  assert!(!s.delete_tweet("1").await.unwrap());
}

// ─── Infographics ────────────────────────────────────────────────────────────

#[tokio::test]
async fn infographics_register_once() {
  let s = store().await;
  let info = s
    .create_infographic(NewInfographic { name: "chart.png".into(), file_size: 2048 })
    .await
    .unwrap();
  let fetched = s.get_infographic(info.id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "chart.png");
  assert_eq!(fetched.file_size, 2048);
  assert_eq!(s.list_infographics().await.unwrap().len(), 1);

  let err = s
    .create_infographic(NewInfographic { name: "chart.png".into(), file_size: 1 })
    .await
    .unwrap_err();
  match domain(&err) {
    dash_core::Error::Conflict(msg) => assert_eq!(msg, "Infographic already registered"),
    other => panic!("expected conflict, got {other:?}"),
  }
}
