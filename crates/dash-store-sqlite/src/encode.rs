//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! width, so lexical order matches chronological order and `ORDER BY
//! created_at` needs no conversion. JSON columns (`profile`, `keywords`) hold
//! compact JSON text.

use chrono::{DateTime, SecondsFormat, Utc};
use dash_core::{
  model::{Camp, Handle, Infographic, KloutScore, Topic, Tweet, User},
  query::{HandleSort, SortOrder, TopicSort, TweetSort, UserSort},
};
use rusqlite::{Row, types::Type};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

/// Read a timestamp column inside a row mapper.
fn dt_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
  let raw: String = row.get(idx)?;
  parse_column_dt(idx, &raw)
}

fn opt_dt_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
  let raw: Option<String> = row.get(idx)?;
  raw.map(|s| parse_column_dt(idx, &s)).transpose()
}

fn parse_column_dt(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(raw)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
  let raw: String = row.get(idx)?;
  serde_json::from_str(&raw)
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ─── Search patterns ─────────────────────────────────────────────────────────

/// `%term%` with LIKE wildcards in `term` escaped by `\`. Use with
/// `LIKE ?n ESCAPE '\'`.
pub fn like_pattern(term: &str) -> String {
  let mut out = String::with_capacity(term.len() + 2);
  out.push('%');
  for c in term.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

// ─── Sorting ─────────────────────────────────────────────────────────────────

pub fn direction(order: SortOrder) -> &'static str {
  match order {
    SortOrder::Asc => "ASC",
    SortOrder::Desc => "DESC",
  }
}

pub fn handle_sort_column(sort: HandleSort) -> &'static str {
  match sort {
    HandleSort::Id => "h.id",
    HandleSort::Name => "h.name",
    HandleSort::Username => "h.username",
    HandleSort::CreatedAt => "h.created_at",
    HandleSort::KloutScore => "h.klout_score",
  }
}

pub fn topic_sort_column(sort: TopicSort) -> &'static str {
  match sort {
    TopicSort::Id => "t.id",
    TopicSort::Name => "t.name",
    TopicSort::CreatedAt => "t.created_at",
  }
}

pub fn user_sort_column(sort: UserSort) -> &'static str {
  match sort {
    UserSort::Name => "u.name",
    UserSort::Email => "u.email",
    UserSort::CreatedAt => "u.created_at",
    UserSort::LastLoginAt => "u.last_login_at",
  }
}

pub fn tweet_sort_column(sort: TweetSort) -> &'static str {
  match sort {
    TweetSort::Id => "CAST(w.id AS INTEGER)",
    TweetSort::CreatedAt => "w.created_at",
  }
}

// ─── Row mappers ─────────────────────────────────────────────────────────────
//
// Each `*_COLUMNS` list is qualified with the alias its mapper expects and
// must stay in the same order as the mapper's `row.get` indices.

pub const USER_COLUMNS: &str = "u.id, u.email, u.name, u.last_login_at, u.created_at, u.updated_at";

pub fn user_row(row: &Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    id:            row.get(0)?,
    email:         row.get(1)?,
    name:          row.get(2)?,
    last_login_at: opt_dt_column(row, 3)?,
    created_at:    dt_column(row, 4)?,
    updated_at:    dt_column(row, 5)?,
  })
}

pub const CAMP_COLUMNS: &str = "c.id, c.name, c.description, c.created_at, c.updated_at";

pub fn camp_row(row: &Row<'_>) -> rusqlite::Result<Camp> {
  Ok(Camp {
    id:          row.get(0)?,
    name:        row.get(1)?,
    description: row.get(2)?,
    created_at:  dt_column(row, 3)?,
    updated_at:  dt_column(row, 4)?,
  })
}

pub const HANDLE_COLUMNS: &str = "h.id, h.uid, h.username, h.name, h.profile, h.camp_id, \
                                  h.klout_id, h.klout_score, h.klout_checked_at, \
                                  h.created_at, h.updated_at";

pub fn handle_row(row: &Row<'_>) -> rusqlite::Result<Handle> {
  Ok(Handle {
    id:               row.get(0)?,
    uid:              row.get(1)?,
    username:         row.get(2)?,
    name:             row.get(3)?,
    profile:          json_column(row, 4)?,
    camp_id:          row.get(5)?,
    klout_id:         row.get(6)?,
    klout_score:      row.get(7)?,
    klout_checked_at: opt_dt_column(row, 8)?,
    created_at:       dt_column(row, 9)?,
    updated_at:       dt_column(row, 10)?,
  })
}

pub const TOPIC_COLUMNS: &str = "t.id, t.name, t.description, t.keywords, t.created_at, t.updated_at";

pub fn topic_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
  Ok(Topic {
    id:          row.get(0)?,
    name:        row.get(1)?,
    description: row.get(2)?,
    keywords:    json_column(row, 3)?,
    created_at:  dt_column(row, 4)?,
    updated_at:  dt_column(row, 5)?,
  })
}

pub const KLOUT_SCORE_COLUMNS: &str =
  "k.id, k.handle_id, k.value, k.delta_day, k.delta_week, k.delta_month, k.created_at";

pub fn klout_score_row(row: &Row<'_>) -> rusqlite::Result<KloutScore> {
  Ok(KloutScore {
    id:          row.get(0)?,
    handle_id:   row.get(1)?,
    value:       row.get(2)?,
    delta_day:   row.get(3)?,
    delta_week:  row.get(4)?,
    delta_month: row.get(5)?,
    created_at:  dt_column(row, 6)?,
  })
}

pub const TWEET_COLUMNS: &str =
  "w.id, w.handle_id, w.parent_id, w.text, w.retweeted, w.favorited, w.created_at";

pub fn tweet_row(row: &Row<'_>) -> rusqlite::Result<Tweet> {
  Ok(Tweet {
    id:         row.get(0)?,
    handle_id:  row.get(1)?,
    parent_id:  row.get(2)?,
    text:       row.get(3)?,
    retweeted:  row.get(4)?,
    favorited:  row.get(5)?,
    created_at: dt_column(row, 6)?,
  })
}

pub const INFOGRAPHIC_COLUMNS: &str = "i.id, i.name, i.file_size, i.created_at";

pub fn infographic_row(row: &Row<'_>) -> rusqlite::Result<Infographic> {
  Ok(Infographic {
    id:         row.get(0)?,
    name:       row.get(1)?,
    file_size:  row.get(2)?,
    created_at: dt_column(row, 3)?,
  })
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_have_fixed_width() {
    let whole = Utc.with_ymd_and_hms(2016, 9, 20, 10, 20, 39).unwrap();
    let fractional = whole + chrono::Duration::milliseconds(5);
    let a = encode_dt(whole);
    let b = encode_dt(fractional);
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(parse_column_dt(0, &b).unwrap(), fractional);
  }

  #[test]
  fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("tw"), "%tw%");
    assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
  }
}
