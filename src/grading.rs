//! Answer normalization, grading and the per-character answer diff.
//!
//! Raw vocabulary strings may carry parenthesized annotations (`"psa (gen.)"`,
//! `"velký (adj.)"`) and list several accepted answers separated by `,` or `;`.

use crate::domain::{Direction, Language, Word};

/// XP for a correct answer typed in Czech (production).
pub const XP_TARGET_TO_SOURCE: u32 = 12;
/// XP for a correct answer typed in the translation language (recognition).
pub const XP_SOURCE_TO_TARGET: u32 = 5;

const ADJECTIVE_MARK: &str = "(adj.)";

/// Removes every `(...)` group together with the whitespace around it.
/// An unmatched `(` is kept as-is.
pub fn strip_annotations(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  let mut rest = raw;
  while let Some(open) = rest.find('(') {
    let Some(close) = rest[open..].find(')') else { break };
    out.push_str(rest[..open].trim_end());
    rest = rest[open + close + 1..].trim_start();
  }
  out.push_str(rest);
  out.trim().to_string()
}

/// Accepted literal answers, in source order, original casing kept.
pub fn acceptable_answers(raw: &str) -> Vec<String> {
  strip_annotations(raw)
    .split([',', ';'])
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .collect()
}

pub fn is_adjective(raw: &str) -> bool {
  raw.to_lowercase().contains(ADJECTIVE_MARK)
}

pub fn xp_for(direction: Direction) -> u32 {
  match direction {
    Direction::TargetToSource => XP_TARGET_TO_SOURCE,
    Direction::SourceToTarget => XP_SOURCE_TO_TARGET,
  }
}

/// Raw prompt string for `word` in `direction`.
pub fn raw_prompt(word: &Word, direction: Direction, lang: Language) -> &str {
  match direction {
    Direction::SourceToTarget => &word.cz,
    Direction::TargetToSource => word.translation(lang),
  }
}

/// Raw expected-answer string for `word` in `direction`.
pub fn raw_answer(word: &Word, direction: Direction, lang: Language) -> &str {
  match direction {
    Direction::SourceToTarget => word.translation(lang),
    Direction::TargetToSource => &word.cz,
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
  pub is_correct: bool,
  /// First accepted answer; shown as "the correct answer".
  pub correct_answer: String,
}

/// Case-insensitive membership of the trimmed input in the accepted set.
pub fn judge(user_input: &str, raw_expected: &str) -> Verdict {
  let accepted = acceptable_answers(raw_expected);
  let needle = user_input.trim().to_lowercase();
  let is_correct = accepted.iter().any(|a| a.to_lowercase() == needle);
  Verdict {
    is_correct,
    correct_answer: accepted.into_iter().next().unwrap_or_default(),
  }
}

/// One position of the results-view diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffChar {
  /// User's character at this position, if the answer is long enough.
  pub ch: Option<char>,
  pub matches: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerDiff {
  /// Nothing was typed.
  Empty { correct: String },
  Compared { chars: Vec<DiffChar>, correct: String },
}

/// Position-by-position, case-insensitive comparison over the longer of both strings.
pub fn answer_diff(correct: &str, user: &str) -> AnswerDiff {
  if user.is_empty() {
    return AnswerDiff::Empty { correct: correct.to_string() };
  }
  let u: Vec<char> = user.chars().collect();
  let c: Vec<char> = correct.chars().collect();
  let chars = (0..u.len().max(c.len()))
    .map(|i| {
      let matches = match (u.get(i), c.get(i)) {
        (Some(a), Some(b)) => a.to_lowercase().eq(b.to_lowercase()),
        _ => false,
      };
      DiffChar { ch: u.get(i).copied(), matches }
    })
    .collect();
  AnswerDiff::Compared { chars, correct: correct.to_string() }
}
