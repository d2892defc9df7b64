//! [`SqliteStore`]: the SQLite implementation of [`DashboardStore`].

use std::path::Path;

use chrono::Utc;
use dash_core::{
  Entity,
  model::{
    Camp, Handle, HandlePatch, HandleView, Id, Infographic, KloutScore, NewCamp, NewHandle,
    NewInfographic, NewKloutScore, NewTopic, NewTweet, NewUser, Topic, TopicPatch, TopicView,
    Tweet, TweetFlag, TweetView, User, UserCredentials, UserPatch,
  },
  query::{HandleQuery, HandleRelation, TopicQuery, TopicRelation, TweetQuery, UserFilter, UserQuery},
  store::DashboardStore,
};
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::{
  Error, Result,
  encode::{
    CAMP_COLUMNS, HANDLE_COLUMNS, INFOGRAPHIC_COLUMNS, KLOUT_SCORE_COLUMNS, TOPIC_COLUMNS,
    TWEET_COLUMNS, USER_COLUMNS, camp_row, direction, encode_dt, handle_row, handle_sort_column,
    infographic_row, klout_score_row, like_pattern, topic_row, topic_sort_column, tweet_row,
    tweet_sort_column, user_row, user_sort_column,
  },
  schema::{CONNECTION_PRAGMAS, LATEST_VERSION, MIGRATIONS},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A dashboard store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and migrate it to the latest schema.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  async fn init(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(())
      })
      .await?;
    self.migrate_to(LATEST_VERSION).await
  }

  /// The schema version currently applied (`PRAGMA user_version`).
  pub async fn schema_version(&self) -> Result<u32> {
    let version = self
      .conn
      .call(|conn| Ok(conn.query_row("PRAGMA user_version", [], |r| r.get::<_, u32>(0))?))
      .await?;
    Ok(version)
  }

  /// Apply `up` migrations until `target` is reached, or `down` migrations
  /// if the database is ahead of it. `0` rolls everything back.
  pub async fn migrate_to(&self, target: u32) -> Result<()> {
    let current = self.schema_version().await?;
    if target > LATEST_VERSION {
      return Err(Error::UnknownVersion(target));
    }
    if current > LATEST_VERSION {
      return Err(Error::UnknownVersion(current));
    }
    if current == target {
      return Ok(());
    }

    self
      .conn
      .call(move |conn| {
        if current < target {
          for m in MIGRATIONS.iter().filter(|m| m.version > current && m.version <= target) {
            let tx = conn.transaction()?;
            tx.execute_batch(m.up)?;
            tx.pragma_update(None, "user_version", m.version)?;
            tx.commit()?;
          }
        } else {
          for m in MIGRATIONS.iter().rev().filter(|m| m.version <= current && m.version > target) {
            let tx = conn.transaction()?;
            tx.execute_batch(m.down)?;
            tx.pragma_update(None, "user_version", m.version - 1)?;
            tx.commit()?;
          }
        }
        Ok(())
      })
      .await?;

    tracing::info!(from = current, to = target, "migrated schema");
    Ok(())
  }
}

// ─── Synchronous helpers (run inside `Connection::call`) ─────────────────────

fn query_user(conn: &Connection, id: Id) -> rusqlite::Result<Option<User>> {
  conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM user u WHERE u.id = ?1"),
      params![id],
      user_row,
    )
    .optional()
}

fn query_camp(conn: &Connection, id: Id) -> rusqlite::Result<Option<Camp>> {
  conn
    .query_row(
      &format!("SELECT {CAMP_COLUMNS} FROM camp c WHERE c.id = ?1"),
      params![id],
      camp_row,
    )
    .optional()
}

fn query_handle(conn: &Connection, id: Id) -> rusqlite::Result<Option<Handle>> {
  conn
    .query_row(
      &format!("SELECT {HANDLE_COLUMNS} FROM handle h WHERE h.id = ?1"),
      params![id],
      handle_row,
    )
    .optional()
}

fn query_topic(conn: &Connection, id: Id) -> rusqlite::Result<Option<Topic>> {
  conn
    .query_row(
      &format!("SELECT {TOPIC_COLUMNS} FROM topic t WHERE t.id = ?1"),
      params![id],
      topic_row,
    )
    .optional()
}

fn query_tweet(conn: &Connection, id: &str) -> rusqlite::Result<Option<Tweet>> {
  conn
    .query_row(
      &format!("SELECT {TWEET_COLUMNS} FROM tweet w WHERE w.id = ?1"),
      params![id],
      tweet_row,
    )
    .optional()
}

fn topics_of_handle(conn: &Connection, handle_id: Id) -> rusqlite::Result<Vec<Topic>> {
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {TOPIC_COLUMNS} FROM topic t
     JOIN handle_topic ht ON ht.topic_id = t.id
     WHERE ht.handle_id = ?1
     ORDER BY t.id"
  ))?;
  stmt.query_map(params![handle_id], topic_row)?.collect()
}

fn handles_of_topic(conn: &Connection, topic_id: Id) -> rusqlite::Result<Vec<Handle>> {
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {HANDLE_COLUMNS} FROM handle h
     JOIN handle_topic ht ON ht.handle_id = h.id
     WHERE ht.topic_id = ?1
     ORDER BY h.id"
  ))?;
  stmt.query_map(params![topic_id], handle_row)?.collect()
}

fn scores_of_handle(conn: &Connection, handle_id: Id) -> rusqlite::Result<Vec<KloutScore>> {
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {KLOUT_SCORE_COLUMNS} FROM klout_score k
     WHERE k.handle_id = ?1
     ORDER BY k.created_at, k.id"
  ))?;
  stmt.query_map(params![handle_id], klout_score_row)?.collect()
}

/// Attach the camp (always) and any requested relations.
fn expand_handle(
  conn: &Connection,
  handle: Handle,
  relations: &[HandleRelation],
) -> rusqlite::Result<HandleView> {
  let camp = match handle.camp_id {
    Some(camp_id) => query_camp(conn, camp_id)?,
    None => None,
  };
  let topics = if relations.contains(&HandleRelation::Topics) {
    Some(topics_of_handle(conn, handle.id)?)
  } else {
    None
  };
  let klout_scores = if relations.contains(&HandleRelation::KloutScores) {
    Some(scores_of_handle(conn, handle.id)?)
  } else {
    None
  };
  Ok(HandleView { handle, camp, topics, klout_scores })
}

fn expand_topic(
  conn: &Connection,
  topic: Topic,
  relations: &[TopicRelation],
) -> rusqlite::Result<TopicView> {
  let handles = if relations.contains(&TopicRelation::Handles) {
    Some(handles_of_topic(conn, topic.id)?)
  } else {
    None
  };
  Ok(TopicView { topic, handles })
}

fn tweet_handle(conn: &Connection, tweet: &Tweet) -> rusqlite::Result<Option<Handle>> {
  match tweet.handle_id {
    Some(handle_id) => query_handle(conn, handle_id),
    None => Ok(None),
  }
}

/// Outcome of a relation change, decided inside the connection closure and
/// turned into a domain error outside it.
enum Link<T> {
  Done(T),
  Missing(Entity, Id),
  AlreadyAttached,
  NotAttached,
}

impl<T> Link<T> {
  fn into_result(self) -> Result<T> {
    match self {
      Link::Done(v) => Ok(v),
      Link::Missing(entity, id) => Err(dash_core::Error::not_found(entity, id).into()),
      Link::AlreadyAttached => Err(dash_core::Error::AlreadyAttached.into()),
      Link::NotAttached => Err(dash_core::Error::NotAttached.into()),
    }
  }
}

// ─── DashboardStore impl ─────────────────────────────────────────────────────

impl DashboardStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>> {
    let search = query.filter.search.as_deref().map(like_pattern);
    let sql = format!(
      "SELECT {USER_COLUMNS} FROM user u
       WHERE (?1 IS NULL OR u.name LIKE ?1 ESCAPE '\\' OR u.email LIKE ?1 ESCAPE '\\')
       ORDER BY {} {}, u.id ASC
       LIMIT ?2 OFFSET ?3",
      user_sort_column(query.sort),
      direction(query.order),
    );
    let limit = i64::from(query.page.limit());
    let offset = query.page.sql_offset()?;

    let users = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![search, limit, offset], user_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(users)
  }

  async fn count_users(&self, filter: &UserFilter) -> Result<u64> {
    let search = filter.search.as_deref().map(like_pattern);
    let count = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM user u
           WHERE (?1 IS NULL OR u.name LIKE ?1 ESCAPE '\\' OR u.email LIKE ?1 ESCAPE '\\')",
          params![search],
          |r| r.get::<_, i64>(0),
        )?)
      })
      .await?;
    Ok(count as u64)
  }

  async fn get_user(&self, id: Id) -> Result<Option<User>> {
    Ok(self.conn.call(move |conn| Ok(query_user(conn, id)?)).await?)
  }

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let now = Utc::now();
    let at = encode_dt(now);
    let email = input.email.clone();
    let name = input.name.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user (email, name, password, password_reset, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          params![input.email, input.name, input.password, input.password_reset, at],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(User { id, email, name, last_login_at: None, created_at: now, updated_at: now })
  }

  async fn update_user(&self, id: Id, patch: UserPatch) -> Result<Option<User>> {
    let now = Utc::now();
    let at = encode_dt(now);

    let user = self
      .conn
      .call(move |conn| {
        let Some(mut user) = query_user(conn, id)? else {
          return Ok(None);
        };
        if let Some(email) = patch.email {
          user.email = email;
        }
        if let Some(name) = patch.name {
          user.name = name;
        }
        user.updated_at = now;
        conn.execute(
          "UPDATE user SET email = ?1, name = ?2, updated_at = ?3 WHERE id = ?4",
          params![user.email, user.name, at, id],
        )?;
        Ok(Some(user))
      })
      .await?;
    Ok(user)
  }

  async fn delete_user(&self, id: Id) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM user WHERE id = ?1", params![id])?))
      .await?;
    Ok(deleted > 0)
  }

  async fn user_credentials(&self, id: Id) -> Result<Option<UserCredentials>> {
    let creds = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT password, password_reset FROM user WHERE id = ?1",
              params![id],
              |row| {
                Ok(UserCredentials { password: row.get(0)?, password_reset: row.get(1)? })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(creds)
  }

  async fn set_password_reset(&self, id: Id, hash: Option<String>) -> Result<bool> {
    let at = encode_dt(Utc::now());
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE user SET password_reset = ?1, updated_at = ?2 WHERE id = ?3",
          params![hash, at, id],
        )?)
      })
      .await?;
    Ok(updated > 0)
  }

  async fn set_password(&self, id: Id, hash: String) -> Result<bool> {
    let at = encode_dt(Utc::now());
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE user SET password = ?1, password_reset = NULL, updated_at = ?2 WHERE id = ?3",
          params![hash, at, id],
        )?)
      })
      .await?;
    Ok(updated > 0)
  }

  // ── Camps ─────────────────────────────────────────────────────────────────

  async fn list_camps(&self) -> Result<Vec<Camp>> {
    let camps = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT {CAMP_COLUMNS} FROM camp c ORDER BY c.id"))?;
        let rows = stmt.query_map([], camp_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(camps)
  }

  async fn get_camp(&self, id: Id) -> Result<Option<Camp>> {
    Ok(self.conn.call(move |conn| Ok(query_camp(conn, id)?)).await?)
  }

  async fn create_camp(&self, input: NewCamp) -> Result<Camp> {
    let now = Utc::now();
    let at = encode_dt(now);
    let name = input.name.clone();
    let description = input.description.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO camp (name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
          params![input.name, input.description, at],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Camp { id, name, description, created_at: now, updated_at: now })
  }

  async fn delete_camp(&self, id: Id) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM camp WHERE id = ?1", params![id])?))
      .await?;
    Ok(deleted > 0)
  }

  // ── Handles ───────────────────────────────────────────────────────────────

  async fn list_handles(&self, query: &HandleQuery) -> Result<Vec<HandleView>> {
    let search = query.filter.search.as_deref().map(like_pattern);
    let camp = query.filter.camp;
    let topic = query.filter.topic;
    let limit = i64::from(query.page.limit());
    let offset = query.page.sql_offset()?;
    let relations = query.relations.clone();
    let sql = format!(
      "SELECT {HANDLE_COLUMNS} FROM handle h
       WHERE (?1 IS NULL OR h.username LIKE ?1 ESCAPE '\\' OR h.name LIKE ?1 ESCAPE '\\')
         AND (?2 IS NULL OR h.camp_id = ?2)
         AND (?3 IS NULL OR EXISTS (
               SELECT 1 FROM handle_topic ht WHERE ht.handle_id = h.id AND ht.topic_id = ?3))
       ORDER BY {} {}, h.id ASC
       LIMIT ?4 OFFSET ?5",
      handle_sort_column(query.sort),
      direction(query.order),
    );

    let views = self
      .conn
      .call(move |conn| {
        let handles = {
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map(params![search, camp, topic, limit, offset], handle_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        let views = handles
          .into_iter()
          .map(|h| expand_handle(conn, h, &relations))
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(views)
      })
      .await?;
    Ok(views)
  }

  async fn get_handle(&self, id: Id, relations: &[HandleRelation]) -> Result<Option<HandleView>> {
    let relations = relations.to_vec();
    let view = self
      .conn
      .call(move |conn| {
        let view = query_handle(conn, id)?
          .map(|h| expand_handle(conn, h, &relations))
          .transpose()?;
        Ok(view)
      })
      .await?;
    Ok(view)
  }

  async fn find_handle_by_uid(&self, uid: i64) -> Result<Option<Handle>> {
    let handle = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {HANDLE_COLUMNS} FROM handle h WHERE h.uid = ?1"),
              params![uid],
              handle_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(handle)
  }

  async fn create_handle(&self, input: NewHandle) -> Result<Handle> {
    let now = Utc::now();
    let at = encode_dt(now);
    let profile = serde_json::to_string(&input.profile)?;
    let (uid, username, name, camp_id, klout_id) = (
      input.uid,
      input.username.clone(),
      input.name.clone(),
      input.camp_id,
      input.klout_id.clone(),
    );

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO handle (uid, username, name, profile, camp_id, klout_id, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          params![uid, username, name, profile, camp_id, klout_id, at],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    tracing::debug!(handle_id = id, username = %input.username, "created handle");
    Ok(Handle {
      id,
      uid: input.uid,
      username: input.username,
      name: input.name,
      profile: input.profile,
      camp_id: input.camp_id,
      klout_id: input.klout_id,
      klout_score: None,
      klout_checked_at: None,
      created_at: now,
      updated_at: now,
    })
  }

  async fn update_handle(&self, id: Id, patch: HandlePatch) -> Result<Option<Handle>> {
    let now = Utc::now();
    let at = encode_dt(now);

    let handle = self
      .conn
      .call(move |conn| {
        let Some(mut handle) = query_handle(conn, id)? else {
          return Ok(None);
        };
        if let Some(name) = patch.name {
          handle.name = name;
        }
        if let Some(camp_id) = patch.camp_id {
          handle.camp_id = camp_id;
        }
        handle.updated_at = now;
        conn.execute(
          "UPDATE handle SET name = ?1, camp_id = ?2, updated_at = ?3 WHERE id = ?4",
          params![handle.name, handle.camp_id, at, id],
        )?;
        Ok(Some(handle))
      })
      .await?;
    Ok(handle)
  }

  async fn delete_handle(&self, id: Id) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM handle WHERE id = ?1", params![id])?))
      .await?;
    Ok(deleted > 0)
  }

  async fn handle_topics(&self, id: Id) -> Result<Vec<Topic>> {
    self
      .conn
      .call(move |conn| {
        if query_handle(conn, id)?.is_none() {
          return Ok(Link::Missing(Entity::Handle, id));
        }
        Ok(Link::Done(topics_of_handle(conn, id)?))
      })
      .await?
      .into_result()
  }

  async fn attach_topic(&self, handle_id: Id, topic_id: Id) -> Result<Topic> {
    let at = encode_dt(Utc::now());
    let link = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if query_handle(&tx, handle_id)?.is_none() {
          return Ok(Link::Missing(Entity::Handle, handle_id));
        }
        let Some(topic) = query_topic(&tx, topic_id)? else {
          return Ok(Link::Missing(Entity::Topic, topic_id));
        };
        let inserted = tx.execute(
          "INSERT INTO handle_topic (handle_id, topic_id, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?3)
           ON CONFLICT (handle_id, topic_id) DO NOTHING",
          params![handle_id, topic_id, at],
        )?;
        if inserted == 0 {
          return Ok(Link::AlreadyAttached);
        }
        tx.commit()?;
        Ok(Link::Done(topic))
      })
      .await?;
    link.into_result()
  }

  async fn detach_topic(&self, handle_id: Id, topic_id: Id) -> Result<()> {
    let link = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if query_handle(&tx, handle_id)?.is_none() {
          return Ok(Link::Missing(Entity::Handle, handle_id));
        }
        if query_topic(&tx, topic_id)?.is_none() {
          return Ok(Link::Missing(Entity::Topic, topic_id));
        }
        let deleted = tx.execute(
          "DELETE FROM handle_topic WHERE handle_id = ?1 AND topic_id = ?2",
          params![handle_id, topic_id],
        )?;
        if deleted == 0 {
          return Ok(Link::NotAttached);
        }
        tx.commit()?;
        Ok(Link::Done(()))
      })
      .await?;
    link.into_result()
  }

  // ── Influence scores ──────────────────────────────────────────────────────

  async fn next_refresh_candidate(&self) -> Result<Option<Handle>> {
    let handle = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {HANDLE_COLUMNS} FROM handle h
                 WHERE h.klout_id IS NOT NULL
                 ORDER BY h.klout_checked_at IS NOT NULL, h.klout_checked_at ASC, h.id ASC
                 LIMIT 1"
              ),
              [],
              handle_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(handle)
  }

  async fn mark_refresh_attempt(&self, handle_id: Id) -> Result<()> {
    let at = encode_dt(Utc::now());
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE handle SET klout_checked_at = ?1 WHERE id = ?2",
          params![at, handle_id],
        )?)
      })
      .await?;
    if updated == 0 {
      return Err(dash_core::Error::not_found(Entity::Handle, handle_id).into());
    }
    Ok(())
  }

  async fn record_klout_score(&self, handle_id: Id, sample: NewKloutScore) -> Result<KloutScore> {
    let now = Utc::now();
    let at = encode_dt(now);
    let NewKloutScore { value, delta_day, delta_week, delta_month } = sample;

    let link = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE handle SET klout_score = ?1, klout_checked_at = ?2, updated_at = ?2
           WHERE id = ?3",
          params![value, at, handle_id],
        )?;
        if updated == 0 {
          return Ok(Link::Missing(Entity::Handle, handle_id));
        }
        tx.execute(
          "INSERT INTO klout_score (handle_id, value, delta_day, delta_week, delta_month, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![handle_id, value, delta_day, delta_week, delta_month, at],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Link::Done(id))
      })
      .await?;

    let id = link.into_result()?;
    Ok(KloutScore { id, handle_id, value, delta_day, delta_week, delta_month, created_at: now })
  }

  // ── Topics ────────────────────────────────────────────────────────────────

  async fn list_topics(&self, query: &TopicQuery) -> Result<Vec<TopicView>> {
    let search = query.filter.search.as_deref().map(like_pattern);
    let limit = i64::from(query.page.limit());
    let offset = query.page.sql_offset()?;
    let relations = query.relations.clone();
    let sql = format!(
      "SELECT {TOPIC_COLUMNS} FROM topic t
       WHERE (?1 IS NULL OR t.name LIKE ?1 ESCAPE '\\')
       ORDER BY {} {}, t.id ASC
       LIMIT ?2 OFFSET ?3",
      topic_sort_column(query.sort),
      direction(query.order),
    );

    let views = self
      .conn
      .call(move |conn| {
        let topics = {
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map(params![search, limit, offset], topic_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        let views = topics
          .into_iter()
          .map(|t| expand_topic(conn, t, &relations))
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(views)
      })
      .await?;
    Ok(views)
  }

  async fn get_topic(&self, id: Id, relations: &[TopicRelation]) -> Result<Option<TopicView>> {
    let relations = relations.to_vec();
    let view = self
      .conn
      .call(move |conn| {
        let view = query_topic(conn, id)?
          .map(|t| expand_topic(conn, t, &relations))
          .transpose()?;
        Ok(view)
      })
      .await?;
    Ok(view)
  }

  async fn create_topic(&self, input: NewTopic) -> Result<Topic> {
    let now = Utc::now();
    let at = encode_dt(now);
    let keywords = serde_json::to_string(&input.keywords)?;
    let (name, description) = (input.name.clone(), input.description.clone());

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO topic (name, description, keywords, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)",
          params![name, description, keywords, at],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Topic {
      id,
      name: input.name,
      description: input.description,
      keywords: input.keywords,
      created_at: now,
      updated_at: now,
    })
  }

  async fn update_topic(&self, id: Id, patch: TopicPatch) -> Result<Option<Topic>> {
    let now = Utc::now();
    let at = encode_dt(now);

    let topic = self
      .conn
      .call(move |conn| {
        let Some(mut topic) = query_topic(conn, id)? else {
          return Ok(None);
        };
        if let Some(name) = patch.name {
          topic.name = name;
        }
        if let Some(description) = patch.description {
          topic.description = description;
        }
        if let Some(keywords) = patch.keywords {
          topic.keywords = keywords;
        }
        topic.updated_at = now;
        let keywords = serde_json::to_string(&topic.keywords)
          .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
        conn.execute(
          "UPDATE topic SET name = ?1, description = ?2, keywords = ?3, updated_at = ?4
           WHERE id = ?5",
          params![topic.name, topic.description, keywords, at, id],
        )?;
        Ok(Some(topic))
      })
      .await?;
    Ok(topic)
  }

  async fn delete_topic(&self, id: Id) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM topic WHERE id = ?1", params![id])?))
      .await?;
    Ok(deleted > 0)
  }

  async fn topic_handles(&self, id: Id) -> Result<Vec<Handle>> {
    self
      .conn
      .call(move |conn| {
        if query_topic(conn, id)?.is_none() {
          return Ok(Link::Missing(Entity::Topic, id));
        }
        Ok(Link::Done(handles_of_topic(conn, id)?))
      })
      .await?
      .into_result()
  }

  // ── Tweets ────────────────────────────────────────────────────────────────

  async fn list_tweets(&self, query: &TweetQuery) -> Result<Vec<TweetView>> {
    let (max_id, handle_uid, topic_id) = (query.max_id, query.handle_uid, query.topic_id);
    let limit = i64::from(query.limit);
    let dir = direction(query.order);
    let sql = format!(
      "SELECT {TWEET_COLUMNS} FROM tweet w
       LEFT JOIN handle h ON h.id = w.handle_id
       WHERE (?1 IS NULL OR CAST(w.id AS INTEGER) <= ?1)
         AND (?2 IS NULL OR h.uid = ?2)
         AND (?3 IS NULL OR EXISTS (
               SELECT 1 FROM handle_topic ht WHERE ht.handle_id = w.handle_id AND ht.topic_id = ?3))
       ORDER BY {} {dir}, CAST(w.id AS INTEGER) {dir}
       LIMIT ?4",
      tweet_sort_column(query.sort),
    );

    let views = self
      .conn
      .call(move |conn| {
        let tweets = {
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map(params![max_id, handle_uid, topic_id, limit], tweet_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        let views = tweets
          .into_iter()
          .map(|tweet| {
            let handle = tweet_handle(conn, &tweet)?;
            Ok(TweetView { tweet, handle, parent: None, replies: None })
          })
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(views)
      })
      .await?;
    Ok(views)
  }

  async fn get_tweet(&self, id: &str) -> Result<Option<TweetView>> {
    let id = id.to_owned();
    let view = self
      .conn
      .call(move |conn| {
        let Some(tweet) = query_tweet(conn, &id)? else {
          return Ok(None);
        };
        let handle = tweet_handle(conn, &tweet)?;
        let parent = match tweet.parent_id.as_deref() {
          Some(parent_id) => query_tweet(conn, parent_id)?,
          None => None,
        };
        let replies = {
          let mut stmt = conn.prepare_cached(&format!(
            "SELECT {TWEET_COLUMNS} FROM tweet w
             WHERE w.parent_id = ?1
             ORDER BY CAST(w.id AS INTEGER)"
          ))?;
          stmt
            .query_map(params![id], tweet_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(Some(TweetView { tweet, handle, parent, replies: Some(replies) }))
      })
      .await?;
    Ok(view)
  }

  async fn insert_tweet(&self, input: NewTweet) -> Result<Tweet> {
    let at = encode_dt(input.created_at);
    let (id, handle_id, parent_id, text) =
      (input.id.clone(), input.handle_id, input.parent_id.clone(), input.text.clone());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO tweet (id, handle_id, parent_id, text, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![id, handle_id, parent_id, text, at],
        )?;
        Ok(())
      })
      .await?;

    Ok(Tweet {
      id:         input.id,
      handle_id:  input.handle_id,
      parent_id:  input.parent_id,
      text:       input.text,
      retweeted:  false,
      favorited:  false,
      created_at: input.created_at,
    })
  }

  async fn set_tweet_flag(&self, id: &str, flag: TweetFlag) -> Result<Option<Tweet>> {
    let id = id.to_owned();
    let (sql, value) = match flag {
      TweetFlag::Retweeted(v) => ("UPDATE tweet SET retweeted = ?1 WHERE id = ?2", v),
      TweetFlag::Favorited(v) => ("UPDATE tweet SET favorited = ?1 WHERE id = ?2", v),
    };

    let tweet = self
      .conn
      .call(move |conn| {
        if conn.execute(sql, params![value, id])? == 0 {
          return Ok(None);
        }
        Ok(query_tweet(conn, &id)?)
      })
      .await?;
    Ok(tweet)
  }

  async fn delete_tweet(&self, id: &str) -> Result<bool> {
    let id = id.to_owned();
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM tweet WHERE id = ?1", params![id])?))
      .await?;
    Ok(deleted > 0)
  }

  // ── Infographics ──────────────────────────────────────────────────────────

  async fn list_infographics(&self) -> Result<Vec<Infographic>> {
    let infographics = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {INFOGRAPHIC_COLUMNS} FROM infographic i ORDER BY i.id"))?;
        let rows = stmt.query_map([], infographic_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(infographics)
  }

  async fn get_infographic(&self, id: Id) -> Result<Option<Infographic>> {
    let infographic = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {INFOGRAPHIC_COLUMNS} FROM infographic i WHERE i.id = ?1"),
              params![id],
              infographic_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(infographic)
  }

  async fn create_infographic(&self, input: NewInfographic) -> Result<Infographic> {
    let now = Utc::now();
    let at = encode_dt(now);
    let (name, file_size) = (input.name.clone(), input.file_size);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO infographic (name, file_size, created_at) VALUES (?1, ?2, ?3)",
          params![name, file_size, at],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Infographic { id, name: input.name, file_size: input.file_size, created_at: now })
  }
}
