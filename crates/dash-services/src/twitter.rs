//! Twitter REST v1.1 client, authenticated with OAuth 1.0a user context.

use std::{
  collections::BTreeMap,
  time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use dash_core::{
  ServiceError,
  service::{PostedStatus, SocialProfile, SocialService, StatusUpdate},
};
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use sha1::Sha1;

use crate::{http_client, transport};

type HmacSha1 = Hmac<Sha1>;

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/1.1";
pub const DEFAULT_UPLOAD_URL: &str = "https://upload.twitter.com/1.1";

/// Twitter's `created_at` format, e.g. `Wed Aug 27 13:08:45 +0000 2008`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

// Upstream error codes with special handling.
const CODE_NO_USER: i64 = 50;
const CODE_NO_PAGE: i64 = 34;
const CODE_RATE_LIMIT: i64 = 88;
const CODE_TWEET_DELETED: i64 = 144;
const CODE_ALREADY_RETWEETED: i64 = 327;

#[derive(Debug, Clone)]
pub struct TwitterConfig {
  pub consumer_key:        String,
  pub consumer_secret:     String,
  pub access_token:        String,
  pub access_token_secret: String,
  pub base_url:            String,
  pub upload_url:          String,
}

/// Signed client for the handful of v1.1 endpoints the dashboard uses.
#[derive(Clone)]
pub struct TwitterClient {
  client: Client,
  config: TwitterConfig,
}

type Params = BTreeMap<String, String>;

fn params<const N: usize>(pairs: [(&str, &str); N]) -> Params {
  pairs.into_iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect()
}

impl TwitterClient {
  pub fn new(config: TwitterConfig) -> Result<Self, ServiceError> {
    Ok(Self { client: http_client()?, config })
  }

  fn api_url(&self, path: &str) -> String {
    format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// Send a signed request. GET parameters go in the query string, POST
  /// parameters in a form body; both are covered by the signature.
  async fn send(&self, method: Method, url: String, params: Params) -> Result<Value, ServiceError> {
    let header = authorization_header(
      &self.config,
      method.as_str(),
      &url,
      &params,
      &nonce(),
      unix_now(),
    )?;

    let req = self.client.request(method.clone(), &url).header("Authorization", header);
    let req = if method == Method::GET { req.query(&params) } else { req.form(&params) };
    let resp = req.send().await.map_err(transport)?;

    let status = resp.status();
    let body = resp.text().await.map_err(transport)?;
    if !status.is_success() {
      let err = decode_error(status, &body);
      tracing::debug!(%url, %status, error = %err, "twitter request failed");
      return Err(err);
    }
    serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
  }
}

#[derive(Deserialize)]
struct StatusResponse {
  id_str:                    String,
  text:                      String,
  in_reply_to_status_id_str: Option<String>,
  created_at:                String,
  user:                      StatusUser,
}

#[derive(Deserialize)]
struct StatusUser {
  id: i64,
}

#[derive(Deserialize)]
struct MediaResponse {
  media_id_string: String,
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ServiceError> {
  serde_json::from_value(value).map_err(|e| ServiceError::Decode(e.to_string()))
}

fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, ServiceError> {
  DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| ServiceError::Decode(format!("created_at {raw:?}: {e}")))
}

#[async_trait]
impl SocialService for TwitterClient {
  async fn user_profile(&self, username: &str) -> Result<SocialProfile, ServiceError> {
    let profile = self
      .send(Method::GET, self.api_url("users/show.json"), params([("screen_name", username)]))
      .await?;

    let uid = profile["id"]
      .as_i64()
      .ok_or_else(|| ServiceError::Decode("profile has no numeric id".into()))?;
    let username = profile["screen_name"].as_str().unwrap_or(username).to_owned();
    let name = profile["name"].as_str().unwrap_or(&username).to_owned();
    Ok(SocialProfile { uid, username, name, profile })
  }

  async fn update_status(&self, update: StatusUpdate) -> Result<PostedStatus, ServiceError> {
    let mut body = params([("status", update.text.as_str())]);
    if let Some(reply_to) = update.in_reply_to {
      body.insert("in_reply_to_status_id".into(), reply_to);
    }
    if !update.media_ids.is_empty() {
      body.insert("media_ids".into(), update.media_ids.join(","));
    }

    let status: StatusResponse =
      decode(self.send(Method::POST, self.api_url("statuses/update.json"), body).await?)?;
    Ok(PostedStatus {
      id:          status.id_str,
      text:        status.text,
      in_reply_to: status.in_reply_to_status_id_str,
      author_uid:  status.user.id,
      created_at:  parse_created_at(&status.created_at)?,
    })
  }

  async fn upload_media(&self, bytes: Vec<u8>) -> Result<String, ServiceError> {
    let url = format!("{}/media/upload.json", self.config.upload_url.trim_end_matches('/'));
    let data = BASE64.encode(&bytes);
    let media: MediaResponse =
      decode(self.send(Method::POST, url, params([("media_data", data.as_str())])).await?)?;
    tracing::debug!(media_id = %media.media_id_string, size = bytes.len(), "uploaded media");
    Ok(media.media_id_string)
  }

  async fn retweet(&self, status_id: &str) -> Result<(), ServiceError> {
    let url = self.api_url(&format!("statuses/retweet/{status_id}.json"));
    self.send(Method::POST, url, Params::new()).await?;
    Ok(())
  }

  async fn favorite(&self, status_id: &str) -> Result<(), ServiceError> {
    let url = self.api_url("favorites/create.json");
    self.send(Method::POST, url, params([("id", status_id)])).await?;
    Ok(())
  }

  async fn unfavorite(&self, status_id: &str) -> Result<(), ServiceError> {
    let url = self.api_url("favorites/destroy.json");
    self.send(Method::POST, url, params([("id", status_id)])).await?;
    Ok(())
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorBody {
  errors: Vec<ErrorEntry>,
}

#[derive(Deserialize)]
struct ErrorEntry {
  code:    i64,
  message: String,
}

/// Map an error response to a [`ServiceError`]. The first entry of the
/// `errors` array decides; bodies without one fall back to the HTTP status.
pub fn decode_error(status: StatusCode, body: &str) -> ServiceError {
  if let Ok(ErrorBody { errors }) = serde_json::from_str::<ErrorBody>(body)
    && let Some(first) = errors.into_iter().next()
  {
    return match first.code {
      CODE_ALREADY_RETWEETED => ServiceError::AlreadyRetweeted,
      CODE_TWEET_DELETED => ServiceError::TweetDeleted,
      CODE_RATE_LIMIT => ServiceError::RateLimited,
      CODE_NO_USER | CODE_NO_PAGE => ServiceError::NotFound,
      code => ServiceError::Api { code, message: first.message },
    };
  }

  match status {
    StatusCode::NOT_FOUND => ServiceError::NotFound,
    StatusCode::TOO_MANY_REQUESTS => ServiceError::RateLimited,
    other => ServiceError::Api { code: i64::from(other.as_u16()), message: body.trim().to_owned() },
  }
}

// ─── OAuth 1.0a ──────────────────────────────────────────────────────────────

fn nonce() -> String {
  let mut bytes = [0u8; 16];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

fn unix_now() -> u64 {
  SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

/// Build the `Authorization: OAuth ...` header value for a request.
///
/// `url` must not carry a query string; request parameters go in `request`.
pub fn authorization_header(
  config: &TwitterConfig,
  method: &str,
  url: &str,
  request: &Params,
  nonce: &str,
  timestamp: u64,
) -> Result<String, ServiceError> {
  let timestamp = timestamp.to_string();
  let mut oauth = params([
    ("oauth_consumer_key", config.consumer_key.as_str()),
    ("oauth_nonce", nonce),
    ("oauth_signature_method", "HMAC-SHA1"),
    ("oauth_timestamp", timestamp.as_str()),
    ("oauth_token", config.access_token.as_str()),
    ("oauth_version", "1.0"),
  ]);

  let mut signed = oauth.clone();
  signed.extend(request.iter().map(|(k, v)| (k.clone(), v.clone())));
  let param_string = signed
    .iter()
    .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
    .collect::<Vec<_>>()
    .join("&");

  let base = format!(
    "{}&{}&{}",
    method.to_uppercase(),
    percent_encode(url),
    percent_encode(&param_string)
  );
  let key = format!(
    "{}&{}",
    percent_encode(&config.consumer_secret),
    percent_encode(&config.access_token_secret)
  );

  let mut mac = HmacSha1::new_from_slice(key.as_bytes())
    .map_err(|e| ServiceError::Transport(format!("oauth signing key: {e}")))?;
  mac.update(base.as_bytes());
  oauth.insert("oauth_signature".into(), BASE64.encode(mac.finalize().into_bytes()));

  let fields = oauth
    .iter()
    .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
    .collect::<Vec<_>>()
    .join(", ");
  Ok(format!("OAuth {fields}"))
}

/// RFC 3986 percent-encoding: everything but unreserved characters.
fn percent_encode(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for byte in s.bytes() {
    match byte {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(byte as char),
      _ => out.push_str(&format!("%{byte:02X}")),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config() -> TwitterConfig {
    TwitterConfig {
      consumer_key:        "xvz1evFS4wEEPTGEFPHBog".into(),
      consumer_secret:     "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".into(),
      access_token:        "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".into(),
      access_token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".into(),
      base_url:            DEFAULT_BASE_URL.into(),
      upload_url:          DEFAULT_UPLOAD_URL.into(),
    }
  }

  #[test]
  fn signature_matches_published_vector() {
    let body = params([
      ("include_entities", "true"),
      ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
    ]);
    let header = authorization_header(
      &config(),
      "post",
      "https://api.twitter.com/1.1/statuses/update.json",
      &body,
      "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
      1318622958,
    )
    .unwrap();

    assert!(header.starts_with("OAuth "));
    assert!(header.contains(r#"oauth_signature="hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D""#), "{header}");
    assert!(header.contains(r#"oauth_timestamp="1318622958""#));
    assert!(!header.contains("status="));
  }

  #[test]
  fn percent_encoding_is_rfc3986() {
    assert_eq!(percent_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
    assert_eq!(percent_encode("a-b.c_d~e"), "a-b.c_d~e");
    assert_eq!(percent_encode("☃"), "%E2%98%83");
  }

  #[test]
  fn nonces_are_unique_hex() {
    let a = nonce();
    assert_eq!(a.len(), 32);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, nonce());
  }

  #[test]
  fn upstream_codes_map_to_service_errors() {
    let body = |code: i64| format!(r#"{{"errors":[{{"code":{code},"message":"m"}}]}}"#);
    assert_eq!(decode_error(StatusCode::FORBIDDEN, &body(327)), ServiceError::AlreadyRetweeted);
    assert_eq!(decode_error(StatusCode::NOT_FOUND, &body(144)), ServiceError::TweetDeleted);
    assert_eq!(decode_error(StatusCode::TOO_MANY_REQUESTS, &body(88)), ServiceError::RateLimited);
    assert_eq!(decode_error(StatusCode::NOT_FOUND, &body(50)), ServiceError::NotFound);
    assert_eq!(
      decode_error(StatusCode::FORBIDDEN, &body(139)),
      ServiceError::Api { code: 139, message: "m".into() }
    );
  }

  #[test]
  fn unstructured_errors_fall_back_to_status() {
    assert_eq!(decode_error(StatusCode::NOT_FOUND, "nope"), ServiceError::NotFound);
    assert_eq!(
      decode_error(StatusCode::BAD_GATEWAY, " upstream down "),
      ServiceError::Api { code: 502, message: "upstream down".into() }
    );
  }

  #[test]
  fn created_at_parses_twitter_format() {
    let dt = parse_created_at("Wed Aug 27 13:08:45 +0000 2008").unwrap();
    assert_eq!(dt.to_rfc3339(), "2008-08-27T13:08:45+00:00");
  }
}
