//! In-memory doubles for the backend, the stage and the presenter.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api::Backend;
use crate::dictionary::SearchHit;
use crate::domain::{Gender, LectureKey, UserProfile, Word, XpUpdate};
use crate::error::ApiError;
use crate::keyboard::CzechKeyboard;
use crate::navigation::{Markup, ScreenId, ScreenLifecycle, Stage};
use crate::presenter::{DictionaryView, LectureMenu, Notice, Presenter, ResultsView};
use crate::profile::{LeaderboardRow, ProfileView};
use crate::protocol::InitialData;
use crate::training::{Feedback, Question};
use crate::util::contains_ci;

fn rejected(status: StatusCode, message: &str) -> ApiError {
  ApiError::Status { status, message: message.into() }
}

async fn pause(ms: u64) {
  if ms > 0 {
    tokio::time::sleep(Duration::from_millis(ms)).await;
  }
}

#[derive(Default)]
pub struct FakeBackend {
  words: Mutex<Vec<Word>>,
  word_fetches: AtomicUsize,
  fail_words: AtomicBool,
  fetch_delay_ms: AtomicU64,
  server_xp: AtomicU64,
  xp_deltas: Mutex<Vec<u32>>,
  xp_delay_ms: AtomicU64,
  fail_xp: AtomicBool,
  users: Mutex<HashMap<String, (String, UserProfile)>>,
  session: Mutex<Option<String>>,
  initial: Mutex<InitialData>,
  saved_avatars: Mutex<Vec<(Option<Gender>, Option<String>)>>,
  saved_eggs: Mutex<Vec<BTreeSet<String>>>,
  searches: Mutex<Vec<String>>,
  search_delay_ms: AtomicU64,
  logouts: AtomicUsize,
}

impl FakeBackend {
  pub fn with_words(words: Vec<Word>) -> Self {
    let backend = Self::default();
    *backend.words.lock().unwrap() = words;
    backend
  }

  pub fn word(cz: &str, ua: &str, lecture: u32) -> Word {
    Word {
      cz: cz.into(),
      ua: ua.into(),
      ru: String::new(),
      en: String::new(),
      lecture,
      is_special_entry: false,
    }
  }

  /// Registers an account; `logged_in` also opens a session for it.
  pub fn add_user(&self, profile: UserProfile, pin: &str, logged_in: bool) {
    if logged_in {
      *self.session.lock().unwrap() = Some(profile.username.clone());
    }
    self.server_xp.store(profile.xp, Ordering::SeqCst);
    self
      .users
      .lock()
      .unwrap()
      .insert(profile.username.clone(), (pin.to_string(), profile));
  }

  pub fn set_initial(&self, data: InitialData) {
    *self.initial.lock().unwrap() = data;
  }

  pub fn word_fetches(&self) -> usize {
    self.word_fetches.load(Ordering::SeqCst)
  }

  pub fn fail_word_fetches(&self, fail: bool) {
    self.fail_words.store(fail, Ordering::SeqCst);
  }

  pub fn set_fetch_delay_ms(&self, ms: u64) {
    self.fetch_delay_ms.store(ms, Ordering::SeqCst);
  }

  pub fn set_server_xp(&self, xp: u64) {
    self.server_xp.store(xp, Ordering::SeqCst);
  }

  pub fn set_xp_delay_ms(&self, ms: u64) {
    self.xp_delay_ms.store(ms, Ordering::SeqCst);
  }

  pub fn fail_xp_updates(&self, fail: bool) {
    self.fail_xp.store(fail, Ordering::SeqCst);
  }

  pub fn xp_deltas(&self) -> Vec<u32> {
    self.xp_deltas.lock().unwrap().clone()
  }

  pub fn set_search_delay_ms(&self, ms: u64) {
    self.search_delay_ms.store(ms, Ordering::SeqCst);
  }

  pub fn searches(&self) -> Vec<String> {
    self.searches.lock().unwrap().clone()
  }

  pub fn saved_avatars(&self) -> Vec<(Option<Gender>, Option<String>)> {
    self.saved_avatars.lock().unwrap().clone()
  }

  pub fn saved_eggs(&self) -> Vec<BTreeSet<String>> {
    self.saved_eggs.lock().unwrap().clone()
  }

  pub fn logouts(&self) -> usize {
    self.logouts.load(Ordering::SeqCst)
  }

  fn session_user(&self) -> Result<String, ApiError> {
    self
      .session
      .lock()
      .unwrap()
      .clone()
      .ok_or_else(|| rejected(StatusCode::UNAUTHORIZED, "Not logged in."))
  }
}

#[async_trait]
impl Backend for FakeBackend {
  async fn session(&self) -> Result<Option<UserProfile>, ApiError> {
    let Some(name) = self.session.lock().unwrap().clone() else {
      return Ok(None);
    };
    Ok(self.users.lock().unwrap().get(&name).map(|(_, p)| p.clone()))
  }

  async fn login(&self, username: &str, pin: &str) -> Result<UserProfile, ApiError> {
    let profile = match self.users.lock().unwrap().get(username) {
      Some((stored, profile)) if stored == pin => profile.clone(),
      _ => return Err(rejected(StatusCode::UNAUTHORIZED, "Invalid credentials.")),
    };
    *self.session.lock().unwrap() = Some(username.to_string());
    Ok(profile)
  }

  async fn register(&self, username: &str, pin: &str) -> Result<UserProfile, ApiError> {
    let profile = UserProfile { username: username.to_string(), ..Default::default() };
    {
      let mut users = self.users.lock().unwrap();
      if users.contains_key(username) {
        return Err(rejected(StatusCode::CONFLICT, "User already exists."));
      }
      users.insert(username.to_string(), (pin.to_string(), profile.clone()));
    }
    *self.session.lock().unwrap() = Some(username.to_string());
    Ok(profile)
  }

  async fn logout(&self) -> Result<(), ApiError> {
    self.logouts.fetch_add(1, Ordering::SeqCst);
    *self.session.lock().unwrap() = None;
    Ok(())
  }

  async fn initial_data(&self) -> Result<InitialData, ApiError> {
    Ok(self.initial.lock().unwrap().clone())
  }

  async fn fetch_words(&self, lectures: &[LectureKey]) -> Result<Vec<Word>, ApiError> {
    self.word_fetches.fetch_add(1, Ordering::SeqCst);
    pause(self.fetch_delay_ms.load(Ordering::SeqCst)).await;
    if self.fail_words.load(Ordering::SeqCst) {
      return Err(rejected(StatusCode::INTERNAL_SERVER_ERROR, "boom"));
    }
    let words = self.words.lock().unwrap().clone();
    if lectures.contains(&LectureKey::Random) {
      return Ok(words);
    }
    Ok(
      words
        .into_iter()
        .filter(|w| lectures.contains(&LectureKey::Lecture(w.lecture)))
        .collect(),
    )
  }

  async fn update_xp(&self, delta: u32) -> Result<XpUpdate, ApiError> {
    pause(self.xp_delay_ms.load(Ordering::SeqCst)).await;
    if self.fail_xp.load(Ordering::SeqCst) {
      return Err(rejected(StatusCode::SERVICE_UNAVAILABLE, "try later"));
    }
    self.xp_deltas.lock().unwrap().push(delta);
    let new_xp = self.server_xp.fetch_add(delta as u64, Ordering::SeqCst) + delta as u64;
    Ok(XpUpdate { new_xp, new_streak: None })
  }

  async fn user_profile(&self, username: &str) -> Result<UserProfile, ApiError> {
    self
      .users
      .lock()
      .unwrap()
      .get(username)
      .map(|(_, p)| p.clone())
      .ok_or_else(|| rejected(StatusCode::NOT_FOUND, "User not found."))
  }

  async fn change_pin(&self, new_pin: &str) -> Result<(), ApiError> {
    let name = self.session_user()?;
    if let Some(entry) = self.users.lock().unwrap().get_mut(&name) {
      entry.0 = new_pin.to_string();
    }
    Ok(())
  }

  async fn save_avatar(&self, gender: Option<Gender>, avatar: Option<&str>) -> Result<(), ApiError> {
    self.session_user()?;
    self.saved_avatars.lock().unwrap().push((gender, avatar.map(str::to_string)));
    Ok(())
  }

  async fn save_easter_eggs(&self, eggs: &BTreeSet<String>) -> Result<(), ApiError> {
    self.session_user()?;
    self.saved_eggs.lock().unwrap().push(eggs.clone());
    Ok(())
  }

  async fn global_search(&self, term: &str) -> Result<Vec<Word>, ApiError> {
    self.searches.lock().unwrap().push(term.to_string());
    pause(self.search_delay_ms.load(Ordering::SeqCst)).await;
    let needle = term.to_lowercase();
    Ok(
      self
        .words
        .lock()
        .unwrap()
        .iter()
        .filter(|w| contains_ci(&w.cz, &needle) || contains_ci(&w.ua, &needle))
        .cloned()
        .collect(),
    )
  }
}

/// Stage that logs every call as "attach x", "exited x", "entered x" or "restore x".
pub struct RecordingStage {
  delay_ms: u64,
  events: Mutex<Vec<String>>,
}

impl RecordingStage {
  pub fn with_delay_ms(delay_ms: u64) -> Self {
    Self { delay_ms, events: Mutex::new(Vec::new()) }
  }

  pub fn events(&self) -> Vec<String> {
    self.events.lock().unwrap().clone()
  }

  fn push(&self, event: String) {
    self.events.lock().unwrap().push(event);
  }
}

#[async_trait]
impl Stage for RecordingStage {
  async fn exit(&self, screen: &ScreenId) {
    pause(self.delay_ms).await;
    self.push(format!("exited {screen}"));
  }

  fn attach(&self, screen: &ScreenId, _markup: &Markup) {
    self.push(format!("attach {screen}"));
  }

  async fn enter(&self, screen: &ScreenId) {
    pause(self.delay_ms).await;
    self.push(format!("entered {screen}"));
  }

  fn restore_defaults(&self, screen: &ScreenId) {
    self.push(format!("restore {screen}"));
  }
}

/// Lifecycle that remembers loaded screens, optionally logging "hook x" into a stage.
#[derive(Default)]
pub struct RecordingLifecycle {
  stage: Option<Arc<RecordingStage>>,
  loaded: Mutex<Vec<ScreenId>>,
}

impl RecordingLifecycle {
  pub fn observing(stage: Arc<RecordingStage>) -> Self {
    Self { stage: Some(stage), loaded: Mutex::new(Vec::new()) }
  }

  pub fn loaded(&self) -> Vec<ScreenId> {
    self.loaded.lock().unwrap().clone()
  }
}

#[async_trait]
impl ScreenLifecycle for RecordingLifecycle {
  async fn screen_loaded(&self, screen: &ScreenId) {
    self.loaded.lock().unwrap().push(screen.clone());
    if let Some(stage) = &self.stage {
      stage.push(format!("hook {screen}"));
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shown {
  Notice(Notice),
  Header(Option<String>),
  Question(Question),
  Keyboard(bool),
  Feedback(Feedback),
  Results(ResultsView),
  Profile(ProfileView),
  Leaderboard(Vec<LeaderboardRow>),
  Lectures(LectureMenu),
  Dictionary(DictionaryView),
  Search(Vec<SearchHit>),
  Settings(Option<Gender>),
  Effect(String),
  StopEffects,
}

#[derive(Default)]
pub struct RecordingPresenter {
  shown: Mutex<Vec<Shown>>,
}

impl RecordingPresenter {
  pub fn shown(&self) -> Vec<Shown> {
    self.shown.lock().unwrap().clone()
  }

  pub fn notices(&self) -> Vec<Notice> {
    self
      .shown()
      .into_iter()
      .filter_map(|s| match s {
        Shown::Notice(n) => Some(n),
        _ => None,
      })
      .collect()
  }

  pub fn last_question(&self) -> Option<Question> {
    self.shown().into_iter().rev().find_map(|s| match s {
      Shown::Question(q) => Some(q),
      _ => None,
    })
  }

  pub fn last_search(&self) -> Option<Vec<SearchHit>> {
    self.shown().into_iter().rev().find_map(|s| match s {
      Shown::Search(h) => Some(h),
      _ => None,
    })
  }

  fn push(&self, shown: Shown) {
    self.shown.lock().unwrap().push(shown);
  }
}

impl Presenter for RecordingPresenter {
  fn notice(&self, notice: &Notice) {
    self.push(Shown::Notice(notice.clone()));
  }

  fn show_header(&self, username: Option<&str>) {
    self.push(Shown::Header(username.map(str::to_string)));
  }

  fn show_question(&self, question: &Question) {
    self.push(Shown::Question(question.clone()));
  }

  fn show_keyboard(&self, keyboard: &CzechKeyboard) {
    self.push(Shown::Keyboard(keyboard.is_shifted()));
  }

  fn show_feedback(&self, feedback: &Feedback) {
    self.push(Shown::Feedback(feedback.clone()));
  }

  fn show_results(&self, results: &ResultsView) {
    self.push(Shown::Results(results.clone()));
  }

  fn show_profile(&self, profile: &ProfileView) {
    self.push(Shown::Profile(profile.clone()));
  }

  fn show_leaderboard(&self, rows: &[LeaderboardRow]) {
    self.push(Shown::Leaderboard(rows.to_vec()));
  }

  fn show_lectures(&self, menu: &LectureMenu) {
    self.push(Shown::Lectures(menu.clone()));
  }

  fn show_dictionary(&self, view: &DictionaryView) {
    self.push(Shown::Dictionary(view.clone()));
  }

  fn show_search_results(&self, hits: &[SearchHit]) {
    self.push(Shown::Search(hits.to_vec()));
  }

  fn show_settings(&self, gender: Option<Gender>) {
    self.push(Shown::Settings(gender));
  }

  fn start_effect(&self, egg: &str) {
    self.push(Shown::Effect(egg.to_string()));
  }

  fn stop_effects(&self) {
    self.push(Shown::StopEffects);
  }
}
