//! Presentation boundary: what the core asks a front end to show.

use std::collections::BTreeSet;
use std::fmt;

use crate::dictionary::{DictionaryEntry, SearchHit};
use crate::domain::{Gender, TrainingResult};
use crate::error::InputError;
use crate::grading::{answer_diff, AnswerDiff};
use crate::keyboard::CzechKeyboard;
use crate::profile::{LeaderboardRow, ProfileView};
use crate::training::{Feedback, Question, Summary};

/// Blocking message for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
  Input(InputError),
  NoWords,
  LoginFailed,
  /// Server-side failure, with the server's message when it sent one.
  Failed(String),
  PinChanged,
}

impl fmt::Display for Notice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Notice::Input(e) => write!(f, "{e}"),
      Notice::NoWords => f.write_str("There are no words for this mode."),
      Notice::LoginFailed => f.write_str("Wrong username or PIN."),
      Notice::Failed(msg) => write!(f, "Something went wrong: {msg}"),
      Notice::PinChanged => f.write_str("PIN changed."),
    }
  }
}

/// Which flow the lecture list serves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
  #[default]
  Training,
  Dictionary,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LectureMenu {
  pub lectures: Vec<u32>,
  pub mode: ViewMode,
  pub selected: BTreeSet<u32>,
}

impl LectureMenu {
  pub fn shows_start_button(&self) -> bool {
    self.mode == ViewMode::Training
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DictionaryView {
  pub lecture: u32,
  pub entries: Vec<DictionaryEntry>,
  /// Notebook only: whether the hidden notebook effect was already found.
  pub notebook_egg_found: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerView {
  Correct(String),
  Diff(AnswerDiff),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultRow {
  pub position: usize,
  pub result: TrainingResult,
  pub answer: AnswerView,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultsView {
  NoAnswers,
  Scored {
    correct: usize,
    total: usize,
    xp: u32,
    rows: Vec<ResultRow>,
  },
}

impl From<Summary> for ResultsView {
  fn from(summary: Summary) -> Self {
    match summary {
      Summary::NoAnswers => ResultsView::NoAnswers,
      Summary::Scored { correct, total, xp, results } => ResultsView::Scored {
        correct,
        total,
        xp,
        rows: results
          .into_iter()
          .enumerate()
          .map(|(i, r)| {
            let answer = if r.is_correct {
              AnswerView::Correct(r.user_answer.clone())
            } else {
              AnswerView::Diff(answer_diff(&r.correct_answer, &r.user_answer))
            };
            ResultRow { position: i + 1, result: r, answer }
          })
          .collect(),
      },
    }
  }
}

/// Implemented by the front end. Calls are fire-and-forget and must not block.
pub trait Presenter: Send + Sync {
  fn notice(&self, notice: &Notice);
  /// Header with the logged-in username, or none after logout.
  fn show_header(&self, username: Option<&str>);
  fn show_question(&self, question: &Question);
  fn show_keyboard(&self, keyboard: &CzechKeyboard);
  fn show_feedback(&self, feedback: &Feedback);
  fn show_results(&self, results: &ResultsView);
  fn show_profile(&self, profile: &ProfileView);
  fn show_leaderboard(&self, rows: &[LeaderboardRow]);
  fn show_lectures(&self, menu: &LectureMenu);
  fn show_dictionary(&self, view: &DictionaryView);
  fn show_search_results(&self, hits: &[SearchHit]);
  fn show_settings(&self, gender: Option<Gender>);
  fn start_effect(&self, egg: &str);
  fn stop_effects(&self);
}
