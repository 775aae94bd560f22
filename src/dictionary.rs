//! Dictionary listing and global search views.

use std::fmt;

use crate::domain::{Language, Word, NOTEBOOK_LECTURE};
use crate::util::contains_ci;

/// Position the hidden entry claims at most (0-based).
const SPECIAL_ENTRY_SLOT: usize = 49;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DictionaryEntry {
  /// 1-based; counts regular words only.
  pub number: usize,
  pub cz: String,
  pub translation: String,
  /// The hidden entry; activating it starts its effect.
  pub special: bool,
}

/// Entries of `lecture` matching `term` (case-insensitive, on Czech or the localized
/// translation). The hidden entry is always listed in the notebook and never elsewhere.
pub fn filter_dictionary(words: &[Word], lecture: u32, term: &str, lang: Language) -> Vec<DictionaryEntry> {
  let term = term.trim().to_lowercase();
  let regular_count = words.iter().filter(|w| !w.is_special_entry).count();
  let mut regular_idx = 0;
  let mut out = Vec::new();

  for w in words {
    if w.is_special_entry {
      if lecture == NOTEBOOK_LECTURE {
        out.push(DictionaryEntry {
          number: regular_count.min(SPECIAL_ENTRY_SLOT) + 1,
          cz: w.cz.clone(),
          translation: format!("{}, {}, {}", w.ua, w.ru, w.en),
          special: true,
        });
      }
      continue;
    }
    regular_idx += 1;
    let translation = w.translation(lang);
    if contains_ci(&w.cz, &term) || contains_ci(translation, &term) {
      out.push(DictionaryEntry {
        number: regular_idx,
        cz: w.cz.clone(),
        translation: translation.to_string(),
        special: false,
      });
    }
  }
  out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LectureLabel {
  Notebook,
  Lecture(u32),
}

impl From<u32> for LectureLabel {
  fn from(id: u32) -> Self {
    if id == NOTEBOOK_LECTURE { LectureLabel::Notebook } else { LectureLabel::Lecture(id) }
  }
}

impl fmt::Display for LectureLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LectureLabel::Notebook => f.write_str("Notebook"),
      LectureLabel::Lecture(id) => write!(f, "L{id}"),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
  pub lecture: LectureLabel,
  pub cz: String,
  pub translation: String,
}

pub fn search_hits(words: &[Word], lang: Language) -> Vec<SearchHit> {
  words
    .iter()
    .map(|w| SearchHit {
      lecture: w.lecture.into(),
      cz: w.cz.clone(),
      translation: w.translation(lang).to_string(),
    })
    .collect()
}
