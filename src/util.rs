//! Small utility helpers used across modules.

/// Log-safe truncation for large strings.
/// Avoids spamming logs with whole HTML error pages.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

/// Case-insensitive substring test; an empty needle matches everything.
pub fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
  needle_lower.is_empty() || haystack.to_lowercase().contains(needle_lower)
}

/// 3..=24 characters.
pub fn is_valid_username(username: &str) -> bool {
  (3..=24).contains(&username.chars().count())
}

/// Exactly four ASCII digits.
pub fn is_valid_pin(pin: &str) -> bool {
  pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit())
}
