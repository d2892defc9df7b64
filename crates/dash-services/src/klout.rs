//! Klout REST client.

use async_trait::async_trait;
use dash_core::{
  ServiceError,
  service::{InfluenceScore, InfluenceService},
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{http_client, transport};

pub const DEFAULT_BASE_URL: &str = "http://api.klout.com/v2";

#[derive(Debug, Clone)]
pub struct KloutConfig {
  pub api_key:  String,
  pub base_url: String,
}

/// Influence-score lookups against the Klout v2 API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct KloutClient {
  client: Client,
  config: KloutConfig,
}

#[derive(Deserialize)]
struct IdentityResponse {
  id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreResponse {
  score:       f64,
  #[serde(default)]
  score_delta: ScoreDelta,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ScoreDelta {
  day_change:   f64,
  week_change:  f64,
  month_change: f64,
}

impl From<ScoreResponse> for InfluenceScore {
  fn from(r: ScoreResponse) -> Self {
    InfluenceScore {
      score:        r.score,
      day_change:   r.score_delta.day_change,
      week_change:  r.score_delta.week_change,
      month_change: r.score_delta.month_change,
    }
  }
}

impl KloutClient {
  pub fn new(config: KloutConfig) -> Result<Self, ServiceError> {
    Ok(Self { client: http_client()?, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
  }

  async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, &str)],
  ) -> Result<T, ServiceError> {
    let resp = self
      .client
      .get(self.url(path))
      .query(query)
      .query(&[("key", self.config.api_key.as_str())])
      .send()
      .await
      .map_err(transport)?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(status_error(status, body));
    }
    resp.json().await.map_err(|e| ServiceError::Decode(e.to_string()))
  }
}

/// Klout answers over-quota requests with 403 "Over Rate" as well as 429.
fn status_error(status: StatusCode, body: String) -> ServiceError {
  match status {
    StatusCode::NOT_FOUND => ServiceError::NotFound,
    StatusCode::TOO_MANY_REQUESTS => ServiceError::RateLimited,
    StatusCode::FORBIDDEN if body.contains("Over Rate") => ServiceError::RateLimited,
    other => ServiceError::Api { code: i64::from(other.as_u16()), message: body },
  }
}

#[async_trait]
impl InfluenceService for KloutClient {
  async fn identity(&self, username: &str) -> Result<Option<String>, ServiceError> {
    match self
      .get::<IdentityResponse>("identity.json/twitter", &[("screenName", username)])
      .await
    {
      Ok(identity) => Ok(Some(identity.id)),
      Err(ServiceError::NotFound) => Ok(None),
      Err(e) => Err(e),
    }
  }

  async fn score(&self, identity: &str) -> Result<InfluenceScore, ServiceError> {
    let resp: ScoreResponse = self.get(&format!("user.json/{identity}/score"), &[]).await?;
    Ok(resp.into())
  }
}
