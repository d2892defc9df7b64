//! List queries: filters, allow-listed sort fields, pagination and relation
//! expansion, plus the parsers that turn raw query-string values into them.
//!
//! Every parser returns [`Error::Validation`] naming the offending field, so
//! the HTTP layer can answer 400 without knowing the allow-lists.

use std::str::FromStr;

use serde::{Deserialize, de::DeserializeOwned};
use strum::{AsRefStr, EnumString, VariantNames};

use crate::{Error, Result, model::Id};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

// ─── Shared pieces ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
  #[default]
  Asc,
  Desc,
}

/// 1-indexed page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
  pub page:      u32,
  pub page_size: u32,
}

impl Default for Page {
  fn default() -> Self { Self { page: 1, page_size: DEFAULT_PAGE_SIZE } }
}

impl Page {
  pub fn limit(&self) -> u32 { self.page_size }

  pub fn offset(&self) -> u64 {
    u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
  }

  /// [`Page::offset`] as a SQL `OFFSET` value. Fails when the offset does not
  /// fit in an `i64`.
  pub fn sql_offset(&self) -> Result<i64> {
    i64::try_from(self.offset()).map_err(|_| {
      Error::validation(
        "page",
        format!("[\"page\" {} is too large for pageSize {}]", self.page, self.page_size),
      )
    })
  }
}

// ─── Handles ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum HandleSort {
  #[default]
  Id,
  Name,
  Username,
  CreatedAt,
  KloutScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum HandleRelation {
  Camp,
  Topics,
  KloutScores,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandleFilter {
  /// Case-insensitive substring of `username` or `name`.
  pub search: Option<String>,
  pub camp:   Option<Id>,
  pub topic:  Option<Id>,
}

#[derive(Debug, Clone, Default)]
pub struct HandleQuery {
  pub filter:    HandleFilter,
  pub sort:      HandleSort,
  pub order:     SortOrder,
  pub page:      Page,
  pub relations: Vec<HandleRelation>,
}

// ─── Topics ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum TopicSort {
  #[default]
  Id,
  Name,
  CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum TopicRelation {
  Handles,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicFilter {
  pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TopicQuery {
  pub filter:    TopicFilter,
  pub sort:      TopicSort,
  pub order:     SortOrder,
  pub page:      Page,
  pub relations: Vec<TopicRelation>,
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum UserSort {
  #[default]
  Name,
  Email,
  CreatedAt,
  LastLoginAt,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserFilter {
  /// Substring of `name` or `email`.
  pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
  pub filter: UserFilter,
  pub sort:   UserSort,
  pub order:  SortOrder,
  pub page:   Page,
}

// ─── Tweets ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum TweetSort {
  #[default]
  Id,
  CreatedAt,
}

/// Timeline query. Tweets always carry their handle.
#[derive(Debug, Clone)]
pub struct TweetQuery {
  /// Only statuses with an id at or below this one.
  pub max_id:     Option<i64>,
  /// Only statuses by the handle with this social-network uid.
  pub handle_uid: Option<i64>,
  /// Only statuses by handles tagged with this topic.
  pub topic_id:   Option<Id>,
  pub limit:      u32,
  pub sort:       TweetSort,
  pub order:      SortOrder,
}

impl Default for TweetQuery {
  fn default() -> Self {
    Self {
      max_id:     None,
      handle_uid: None,
      topic_id:   None,
      limit:      DEFAULT_PAGE_SIZE,
      sort:       TweetSort::Id,
      order:      SortOrder::Desc,
    }
  }
}

// ─── Parsers ─────────────────────────────────────────────────────────────────

/// Parse an allow-listed value (sort field, sort order), falling back to
/// `default` when absent.
pub fn parse_choice<T>(field: &'static str, raw: Option<&str>, default: T) -> Result<T>
where
  T: FromStr + VariantNames,
{
  match raw.map(str::trim) {
    None | Some("") => Ok(default),
    Some(value) => value.parse().map_err(|_| not_allowed::<T>(field, value)),
  }
}

/// Parse a positive integer, falling back to `default` when absent.
pub fn parse_positive(field: &'static str, raw: Option<&str>, default: u32) -> Result<u32> {
  match raw.map(str::trim) {
    None | Some("") => Ok(default),
    Some(value) => match value.parse::<u32>() {
      Ok(n) if n >= 1 => Ok(n),
      _ => Err(Error::validation(field, format!("{value:?} must be a positive integer"))),
    },
  }
}

/// Parse an optional integer id.
pub fn parse_id(field: &'static str, raw: Option<&str>) -> Result<Option<i64>> {
  match raw.map(str::trim) {
    None | Some("") => Ok(None),
    Some(value) => value
      .parse::<i64>()
      .map(Some)
      .map_err(|_| Error::validation(field, format!("{value:?} must be an integer"))),
  }
}

pub fn parse_page(page: Option<&str>, page_size: Option<&str>) -> Result<Page> {
  let page = Page {
    page:      parse_positive("page", page, 1)?,
    page_size: parse_positive("pageSize", page_size, DEFAULT_PAGE_SIZE)?,
  };
  page.sql_offset()?;
  Ok(page)
}

/// Parse a JSON-object `filter` parameter. Unknown keys are rejected.
pub fn parse_filter<F>(raw: Option<&str>) -> Result<F>
where
  F: DeserializeOwned + Default,
{
  match raw.map(str::trim) {
    None | Some("") => Ok(F::default()),
    Some(value) => {
      serde_json::from_str(value).map_err(|e| Error::validation("filter", e.to_string()))
    }
  }
}

/// Parse the `related` parameter: either a JSON array (`["topics"]`) or a
/// comma-separated list (`topics,camp`). Duplicates are dropped.
pub fn parse_relations<R>(raw: Option<&str>) -> Result<Vec<R>>
where
  R: FromStr + VariantNames + PartialEq,
{
  let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
    return Ok(Vec::new());
  };

  let names: Vec<String> = if value.starts_with('[') {
    serde_json::from_str(value)
      .map_err(|_| Error::validation("related", "it must be an array of relation names"))?
  } else {
    value.split(',').map(|s| s.trim().to_owned()).filter(|s| !s.is_empty()).collect()
  };

  let mut relations = Vec::with_capacity(names.len());
  for name in names {
    let relation: R = name.parse().map_err(|_| not_allowed::<R>("related", &name))?;
    if !relations.contains(&relation) {
      relations.push(relation);
    }
  }
  Ok(relations)
}

fn not_allowed<T: VariantNames>(field: &'static str, value: &str) -> Error {
  Error::validation(
    field,
    format!("[{value:?} must be one of [{}]]", T::VARIANTS.join(", ")),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_offsets_are_one_indexed() {
    let page = parse_page(Some("2"), Some("1")).unwrap();
    assert_eq!(page.offset(), 1);
    assert_eq!(page.limit(), 1);
    assert_eq!(Page::default().offset(), 0);
    assert_eq!(Page::default().limit(), 20);
  }

  #[test]
  fn zero_page_is_rejected() {
    let err = parse_page(Some("0"), None).unwrap_err();
    assert!(matches!(err, Error::Validation { field: "page", .. }));
    let err = parse_page(None, Some("abc")).unwrap_err();
    assert!(matches!(err, Error::Validation { field: "pageSize", .. }));
  }

  #[test]
  fn offsets_beyond_i64_are_rejected() {
    let max = u32::MAX.to_string();
    let err = parse_page(Some(&max), Some(&max)).unwrap_err();
    assert!(matches!(err, Error::Validation { field: "page", .. }));

    let page = parse_page(Some(&max), Some("20")).unwrap();
    assert_eq!(page.sql_offset().unwrap(), i64::from(u32::MAX - 1) * 20);
  }

  #[test]
  fn sort_fields_follow_the_allow_list() {
    assert_eq!(
      parse_choice("sort", Some("klout_score"), HandleSort::Id).unwrap(),
      HandleSort::KloutScore
    );
    assert_eq!(parse_choice("sort", None, UserSort::Name).unwrap(), UserSort::Name);
    let err = parse_choice("sort", Some("password"), UserSort::Name).unwrap_err();
    assert!(err.to_string().starts_with("child \"sort\" fails"));
  }

  #[test]
  fn sort_order_parses() {
    assert_eq!(parse_choice("sortOrder", Some("desc"), SortOrder::Asc).unwrap(), SortOrder::Desc);
    assert!(parse_choice("sortOrder", Some("sideways"), SortOrder::Asc).is_err());
  }

  #[test]
  fn relations_accept_json_and_comma_lists() {
    let rels: Vec<HandleRelation> = parse_relations(Some(r#"["topics","camp"]"#)).unwrap();
    assert_eq!(rels, vec![HandleRelation::Topics, HandleRelation::Camp]);

    let rels: Vec<HandleRelation> = parse_relations(Some("klout_scores, topics,topics")).unwrap();
    assert_eq!(rels, vec![HandleRelation::KloutScores, HandleRelation::Topics]);

    let rels: Vec<TopicRelation> = parse_relations(None).unwrap();
    assert!(rels.is_empty());
  }

  #[test]
  fn unknown_relation_names_the_field() {
    let err = parse_relations::<HandleRelation>(Some(r#"["missing"]"#)).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("child \"related\" fails"), "{message}");
    assert!(message.contains("missing"));
  }

  #[test]
  fn filters_reject_unknown_keys() {
    let filter: HandleFilter = parse_filter(Some(r#"{"search":"tw","camp":1}"#)).unwrap();
    assert_eq!(filter.search.as_deref(), Some("tw"));
    assert_eq!(filter.camp, Some(1));
    assert_eq!(filter.topic, None);

    let err = parse_filter::<TopicFilter>(Some(r#"{"camp":1}"#)).unwrap_err();
    assert!(matches!(err, Error::Validation { field: "filter", .. }));
  }
}
