//! On-screen keyboard for Czech diacritics.

use std::ops::Range;

pub const CZECH_LOWER: [char; 15] = ['á', 'č', 'ď', 'é', 'ě', 'í', 'ň', 'ó', 'ř', 'š', 'ť', 'ú', 'ů', 'ý', 'ž'];
pub const CZECH_UPPER: [char; 15] = ['Á', 'Č', 'Ď', 'É', 'Ě', 'Í', 'Ň', 'Ó', 'Ř', 'Š', 'Ť', 'Ú', 'Ů', 'Ý', 'Ž'];
const FIRST_ROW: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CzechKeyboard {
  shift: bool,
}

impl CzechKeyboard {
  pub fn keys(&self) -> &'static [char] {
    if self.shift { &CZECH_UPPER } else { &CZECH_LOWER }
  }

  /// Two rows: eight keys, then the rest.
  pub fn rows(&self) -> (&'static [char], &'static [char]) {
    self.keys().split_at(FIRST_ROW)
  }

  pub fn is_shifted(&self) -> bool {
    self.shift
  }

  pub fn toggle_shift(&mut self) {
    self.shift = !self.shift;
  }
}

/// Replaces `selection` (char offsets, clamped to the text) with `ch`. Returns the new
/// text and the cursor position right after the inserted char.
pub fn insert_char(text: &str, selection: Range<usize>, ch: char) -> (String, usize) {
  let len = text.chars().count();
  let start = selection.start.min(len);
  let end = selection.end.clamp(start, len);
  let mut out: String = text.chars().take(start).collect();
  out.push(ch);
  out.extend(text.chars().skip(end));
  (out, start + 1)
}
