//! Remote API client.
//!
//! `Backend` is the seam the core talks through; `HttpBackend` is the reqwest
//! implementation. The server keeps the login in a cookie session, so one client
//! (with its cookie store) is shared by every call.
//!
//! NOTE: PINs are never logged; request bodies are not logged at all.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::domain::{Gender, LectureKey, UserProfile, Word, XpUpdate};
use crate::error::ApiError;
use crate::protocol::*;
use crate::util::trunc_for_log;

const CLIENT_AGENT: &str = concat!("slovicka/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait Backend: Send + Sync {
  /// Logged-in user of the current cookie session, if any.
  async fn session(&self) -> Result<Option<UserProfile>, ApiError>;
  async fn login(&self, username: &str, pin: &str) -> Result<UserProfile, ApiError>;
  async fn register(&self, username: &str, pin: &str) -> Result<UserProfile, ApiError>;
  async fn logout(&self) -> Result<(), ApiError>;
  async fn initial_data(&self) -> Result<InitialData, ApiError>;
  async fn fetch_words(&self, lectures: &[LectureKey]) -> Result<Vec<Word>, ApiError>;
  /// Adds `delta` XP server-side; returns the server's totals.
  async fn update_xp(&self, delta: u32) -> Result<XpUpdate, ApiError>;
  async fn user_profile(&self, username: &str) -> Result<UserProfile, ApiError>;
  async fn change_pin(&self, new_pin: &str) -> Result<(), ApiError>;
  async fn save_avatar(&self, gender: Option<Gender>, avatar: Option<&str>) -> Result<(), ApiError>;
  async fn save_easter_eggs(&self, eggs: &BTreeSet<String>) -> Result<(), ApiError>;
  async fn global_search(&self, term: &str) -> Result<Vec<Word>, ApiError>;
}

#[derive(Clone)]
pub struct HttpBackend {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpBackend {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
    let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
    if base_url.cannot_be_a_base() {
      return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
    }
    let client = reqwest::Client::builder()
      .cookie_store(true)
      .timeout(timeout)
      .build()?;
    Ok(Self { client, base_url })
  }

  pub fn from_config(cfg: &ClientConfig) -> Result<Self, ApiError> {
    Self::new(&cfg.api_base_url, cfg.timeout())
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
    let url = self.endpoint(segments)?;
    let res = self.client.get(url).header(USER_AGENT, CLIENT_AGENT).send().await?;
    Ok(check_status(res).await?.json().await?)
  }

  async fn post<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> Result<Response, ApiError> {
    let url = self.endpoint(segments)?;
    let res = self
      .client
      .post(url)
      .header(USER_AGENT, CLIENT_AGENT)
      .header(CONTENT_TYPE, "application/json")
      .json(body)
      .send()
      .await?;
    check_status(res).await
  }

  async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    &self,
    segments: &[&str],
    body: &B,
  ) -> Result<T, ApiError> {
    Ok(self.post(segments, body).await?.json().await?)
  }
}

/// Turns a non-success status into `ApiError::Status` with the server's message.
async fn check_status(res: Response) -> Result<Response, ApiError> {
  let status = res.status();
  if status.is_success() {
    return Ok(res);
  }
  let body = res.text().await.unwrap_or_default();
  let message = extract_error_message(&body);
  warn!(target: "api", %status, %message, "API call rejected");
  Err(ApiError::Status { status, message })
}

fn extract_error_message(body: &str) -> String {
  match serde_json::from_str::<ErrorOut>(body) {
    Ok(e) => e.message,
    Err(_) => trunc_for_log(body.trim(), 200),
  }
}

fn logged_in(envelope: UserEnvelope) -> Result<UserProfile, ApiError> {
  envelope.user.ok_or_else(|| ApiError::Status {
    status: reqwest::StatusCode::UNAUTHORIZED,
    message: "response carried no user".into(),
  })
}

#[async_trait]
impl Backend for HttpBackend {
  #[instrument(level = "debug", target = "api", skip(self))]
  async fn session(&self) -> Result<Option<UserProfile>, ApiError> {
    let env: UserEnvelope = self.get_json(&["api", "session"]).await?;
    Ok(env.user)
  }

  #[instrument(level = "info", target = "api", skip(self, pin))]
  async fn login(&self, username: &str, pin: &str) -> Result<UserProfile, ApiError> {
    logged_in(self.post_json(&["api", "login"], &CredentialsIn { username, pin }).await?)
  }

  #[instrument(level = "info", target = "api", skip(self, pin))]
  async fn register(&self, username: &str, pin: &str) -> Result<UserProfile, ApiError> {
    logged_in(self.post_json(&["api", "register"], &CredentialsIn { username, pin }).await?)
  }

  #[instrument(level = "info", target = "api", skip(self))]
  async fn logout(&self) -> Result<(), ApiError> {
    self.post(&["api", "logout"], &serde_json::json!({})).await?;
    Ok(())
  }

  #[instrument(level = "debug", target = "api", skip(self))]
  async fn initial_data(&self) -> Result<InitialData, ApiError> {
    self.get_json(&["api", "data", "initial"]).await
  }

  #[instrument(level = "info", target = "api", skip(self), fields(keys = lectures.len()))]
  async fn fetch_words(&self, lectures: &[LectureKey]) -> Result<Vec<Word>, ApiError> {
    let words: Vec<Word> = self.post_json(&["api", "get_words"], &WordsIn { lectures }).await?;
    debug!(target: "api", count = words.len(), "Words received");
    Ok(words)
  }

  #[instrument(level = "info", target = "api", skip(self))]
  async fn update_xp(&self, delta: u32) -> Result<XpUpdate, ApiError> {
    self.post_json(&["api", "update_xp"], &XpIn { xp: delta }).await
  }

  #[instrument(level = "info", target = "api", skip(self))]
  async fn user_profile(&self, username: &str) -> Result<UserProfile, ApiError> {
    self.get_json(&["api", "user", username]).await
  }

  #[instrument(level = "info", target = "api", skip_all)]
  async fn change_pin(&self, new_pin: &str) -> Result<(), ApiError> {
    self.post(&["api", "settings", "change_pin"], &ChangePinIn { new_pin }).await?;
    Ok(())
  }

  #[instrument(level = "info", target = "api", skip(self))]
  async fn save_avatar(&self, gender: Option<Gender>, avatar: Option<&str>) -> Result<(), ApiError> {
    self.post(&["api", "settings", "save_avatar"], &SaveAvatarIn { gender, avatar }).await?;
    Ok(())
  }

  #[instrument(level = "info", target = "api", skip(self), fields(count = eggs.len()))]
  async fn save_easter_eggs(&self, eggs: &BTreeSet<String>) -> Result<(), ApiError> {
    self.post(&["api", "settings", "save_easter_eggs"], &SaveEggsIn { eggs }).await?;
    Ok(())
  }

  #[instrument(level = "debug", target = "api", skip(self), fields(term_len = term.len()))]
  async fn global_search(&self, term: &str) -> Result<Vec<Word>, ApiError> {
    self.post_json(&["api", "global_search"], &SearchIn { term }).await
  }
}
