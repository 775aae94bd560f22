//! Training session engine: pool building, question rendering contract, grading and
//! result aggregation.
//!
//! The engine owns at most one `TrainingSession`. The session index only grows and the
//! session is complete exactly when it equals the word count. Grading is guarded by a
//! three-state flag (idle, in flight, awaiting render): a grade moves it to in flight
//! before validation, back to idle on the early-return paths, and to awaiting render on
//! success. Only [`TrainingEngine::current_question`] turns awaiting render into idle,
//! so rendering while a grade is still in flight does not re-arm it. Duplicate submits
//! in between are ignored.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::try_join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::api::Backend;
use crate::cache::WordCache;
use crate::domain::{Direction, Language, LectureKey, TrainingMode, TrainingResult, Word};
use crate::error::TrainingError;
use crate::grading::{is_adjective, judge, raw_answer, raw_prompt, strip_annotations, xp_for};
use crate::profile::CurrentUser;

/// Everything fixed when the user commits to a direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPlan {
  pub mode: TrainingMode,
  pub direction: Direction,
  pub language: Language,
  pub selected_lectures: BTreeSet<u32>,
}

#[derive(Clone, Debug)]
pub struct TrainingSession {
  pub id: Uuid,
  pub words: Vec<Word>,
  pub index: usize,
  pub results: Vec<TrainingResult>,
  pub mode: TrainingMode,
  pub direction: Direction,
  pub language: Language,
  pub selected_lectures: BTreeSet<u32>,
}

impl TrainingSession {
  pub fn is_complete(&self) -> bool {
    self.index >= self.words.len()
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
  /// Zero-based position in the session.
  pub index: usize,
  pub total: usize,
  /// Prompt with annotations stripped.
  pub prompt: String,
  /// Show an "(adj.)" marker next to the prompt.
  pub adjective_marker: bool,
}

impl Question {
  /// "3 / 10" style position label.
  pub fn progress_label(&self) -> String {
    format!("{} / {}", self.index + 1, self.total)
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuestionState {
  NoSession,
  /// Every word is graded; the caller moves on to the results view.
  Complete,
  Ask(Question),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feedback {
  pub is_correct: bool,
  pub xp_earned: u32,
  pub correct_answer: String,
  /// Server total after the XP update, when one was made and succeeded.
  pub new_xp: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Grade {
  /// A grade for this question is already in flight or shown.
  Busy,
  /// No active question (no session, session complete or replaced).
  NoQuestion,
  /// Blank input; nothing recorded.
  EmptyAnswer,
  Graded(Feedback),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Summary {
  NoAnswers,
  Scored {
    correct: usize,
    total: usize,
    xp: u32,
    results: Vec<TrainingResult>,
  },
}

pub fn summarize(results: &[TrainingResult]) -> Summary {
  if results.is_empty() {
    return Summary::NoAnswers;
  }
  Summary::Scored {
    correct: results.iter().filter(|r| r.is_correct).count(),
    total: results.len(),
    xp: results.iter().map(|r| r.xp_earned).sum(),
    results: results.to_vec(),
  }
}

const GUARD_IDLE: u8 = 0;
const GUARD_IN_FLIGHT: u8 = 1;
const GUARD_AWAITING_RENDER: u8 = 2;

pub struct TrainingEngine {
  backend: Arc<dyn Backend>,
  cache: Arc<WordCache>,
  user: Arc<CurrentUser>,
  session: Mutex<Option<TrainingSession>>,
  grading: AtomicU8,
}

impl TrainingEngine {
  pub fn new(backend: Arc<dyn Backend>, cache: Arc<WordCache>, user: Arc<CurrentUser>) -> Self {
    Self {
      backend,
      cache,
      user,
      session: Mutex::new(None),
      grading: AtomicU8::new(GUARD_IDLE),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Option<TrainingSession>> {
    self.session.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn release_guard(&self) {
    self.grading.store(GUARD_IDLE, Ordering::Release);
  }

  /// Re-arms grading after a finished grade; a grade still in flight keeps the guard.
  fn rearm_after_render(&self) {
    let _ = self
      .grading
      .compare_exchange(GUARD_AWAITING_RENDER, GUARD_IDLE, Ordering::AcqRel, Ordering::Acquire);
  }

  /// Flat word list for `mode`, fetching uncached lectures. With `exclude_special`
  /// the hidden easter-egg entries are dropped (training); without it they stay
  /// (dictionary). Any fetch failure yields an empty pool.
  #[instrument(level = "info", target = "training", skip(self, lectures), fields(?mode, lectures = lectures.len()))]
  pub async fn build_word_pool(
    &self,
    mode: TrainingMode,
    lectures: &BTreeSet<u32>,
    exclude_special: bool,
  ) -> Vec<Word> {
    let keys: Vec<LectureKey> = match mode {
      TrainingMode::Random => vec![LectureKey::Random],
      TrainingMode::SpecificAll | TrainingMode::SpecificSelected => {
        lectures.iter().copied().map(LectureKey::Lecture).collect()
      }
    };
    if keys.is_empty() {
      warn!(target: "training", ?mode, "No lectures to build a pool from");
      return Vec::new();
    }

    let backend = self.backend.as_ref();
    let buckets = match try_join_all(keys.iter().map(|k| self.cache.get_or_fetch(*k, backend))).await {
      Ok(b) => b,
      Err(e) => {
        error!(target: "training", error = %e, "Loading words failed");
        return Vec::new();
      }
    };

    let pool: Vec<Word> = buckets
      .iter()
      .flat_map(|b| b.iter())
      .filter(|w| !(exclude_special && w.is_special_entry))
      .cloned()
      .collect();
    debug!(target: "training", count = pool.len(), exclude_special, "Pool built");
    pool
  }

  pub fn start_session(&self, pool: Vec<Word>, plan: SessionPlan) -> Result<Uuid, TrainingError> {
    self.start_session_with(pool, plan, &mut rand::thread_rng())
  }

  /// Shuffles `pool` uniformly and replaces any previous session.
  pub fn start_session_with<R: Rng + ?Sized>(
    &self,
    mut pool: Vec<Word>,
    plan: SessionPlan,
    rng: &mut R,
  ) -> Result<Uuid, TrainingError> {
    if pool.is_empty() {
      warn!(target: "training", mode = ?plan.mode, "Refusing to start a session without words");
      return Err(TrainingError::NoWords);
    }
    pool.shuffle(rng);
    let id = Uuid::new_v4();
    info!(target: "training", session = %id, words = pool.len(), direction = ?plan.direction, "Training session started");
    *self.lock() = Some(TrainingSession {
      id,
      words: pool,
      index: 0,
      results: Vec::new(),
      mode: plan.mode,
      direction: plan.direction,
      language: plan.language,
      selected_lectures: plan.selected_lectures,
    });
    self.release_guard();
    Ok(id)
  }

  pub fn set_language(&self, language: Language) {
    if let Some(s) = self.lock().as_mut() {
      s.language = language;
    }
  }

  /// Question at the current index. Must be consulted before rendering; rendering a
  /// question (or the completion hand-off) re-arms grading.
  pub fn current_question(&self) -> QuestionState {
    let state = match self.lock().as_ref() {
      None => return QuestionState::NoSession,
      Some(s) if s.is_complete() => QuestionState::Complete,
      Some(s) => {
        let raw = raw_prompt(&s.words[s.index], s.direction, s.language);
        QuestionState::Ask(Question {
          index: s.index,
          total: s.words.len(),
          prompt: strip_annotations(raw),
          adjective_marker: s.direction == Direction::TargetToSource && is_adjective(raw),
        })
      }
    };
    self.rearm_after_render();
    state
  }

  #[instrument(level = "info", target = "training", skip(self, input), fields(input_len = input.len()))]
  pub async fn grade_answer(&self, input: &str) -> Grade {
    if self
      .grading
      .compare_exchange(GUARD_IDLE, GUARD_IN_FLIGHT, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      debug!(target: "training", "Duplicate submit ignored");
      return Grade::Busy;
    }

    let snapshot = match self.lock().as_ref() {
      Some(s) if !s.is_complete() => Some((s.id, s.index, s.words[s.index].clone(), s.direction, s.language)),
      _ => None,
    };
    let Some((id, index, word, direction, language)) = snapshot else {
      self.release_guard();
      return Grade::NoQuestion;
    };

    let answer = input.trim();
    if answer.is_empty() {
      self.release_guard();
      return Grade::EmptyAnswer;
    }

    let verdict = judge(answer, raw_answer(&word, direction, language));
    let xp_earned = if verdict.is_correct { xp_for(direction) } else { 0 };
    let mut new_xp = None;
    if xp_earned > 0 {
      match self.backend.update_xp(xp_earned).await {
        Ok(update) => {
          self.user.apply_xp(update);
          new_xp = Some(update.new_xp);
        }
        Err(e) => warn!(target: "training", error = %e, "XP update failed; keeping cached XP"),
      }
    }

    let result = TrainingResult {
      question: strip_annotations(raw_prompt(&word, direction, language)),
      user_answer: answer.to_string(),
      is_correct: verdict.is_correct,
      correct_answer: verdict.correct_answer.clone(),
      xp_earned,
    };

    {
      let mut guard = self.lock();
      match guard.as_mut() {
        Some(s) if s.id == id && s.index == index => {
          s.results.push(result);
          s.index += 1;
        }
        _ => {
          // The replacing start/reset already released the guard.
          drop(guard);
          info!(target: "training", session = %id, "Session replaced while grading; result discarded");
          return Grade::NoQuestion;
        }
      }
    }
    self.grading.store(GUARD_AWAITING_RENDER, Ordering::Release);

    debug!(target: "training", session = %id, index, correct = verdict.is_correct, xp_earned, "Answer graded");
    Grade::Graded(Feedback {
      is_correct: verdict.is_correct,
      xp_earned,
      correct_answer: verdict.correct_answer,
      new_xp,
    })
  }

  pub fn summarize(&self) -> Summary {
    match self.lock().as_ref() {
      Some(s) => summarize(&s.results),
      None => Summary::NoAnswers,
    }
  }

  pub fn snapshot(&self) -> Option<TrainingSession> {
    self.lock().clone()
  }

  /// Drops the session (logout).
  pub fn reset(&self) {
    *self.lock() = None;
    self.release_guard();
  }
}
