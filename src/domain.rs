//! Domain models: words, lectures, directions, users and per-answer results.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lecture id of the personal "notebook" pool.
pub const NOTEBOOK_LECTURE: u32 = 0;

/// Interface language; also selects which translation column is used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  Ua,
  Ru,
  En,
}

impl Language {
  pub fn code(self) -> &'static str {
    match self {
      Language::Ua => "ua",
      Language::Ru => "ru",
      Language::En => "en",
    }
  }
}

impl FromStr for Language {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "ua" => Ok(Language::Ua),
      "ru" => Ok(Language::Ru),
      "en" => Ok(Language::En),
      other => Err(format!("unknown language '{other}'")),
    }
  }
}

/// One vocabulary entry as served by the word endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
  #[serde(rename = "CZ")]
  pub cz: String,
  #[serde(rename = "UA", default)]
  pub ua: String,
  #[serde(rename = "RU", default)]
  pub ru: String,
  #[serde(rename = "EN", default)]
  pub en: String,
  #[serde(default)]
  pub lecture: u32,
  /// Hidden easter-egg entry: listed in the dictionary, never trained.
  #[serde(rename = "is_macan_easter_egg", default)]
  pub is_special_entry: bool,
}

impl Word {
  /// Translation for `lang`, falling back to UA when that column is empty.
  pub fn translation(&self, lang: Language) -> &str {
    let t = match lang {
      Language::Ua => &self.ua,
      Language::Ru => &self.ru,
      Language::En => &self.en,
    };
    if t.is_empty() { &self.ua } else { t }
  }
}

/// Cache key and request element of the word endpoint: a lecture id or the synthetic
/// "random" bucket holding every word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LectureKey {
  Lecture(u32),
  Random,
}

impl Serialize for LectureKey {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      LectureKey::Lecture(id) => serializer.serialize_u32(*id),
      LectureKey::Random => serializer.serialize_str("random"),
    }
  }
}

impl fmt::Display for LectureKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LectureKey::Lecture(id) => write!(f, "{id}"),
      LectureKey::Random => f.write_str("random"),
    }
  }
}

/// Which side of the pair is the prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
  /// Czech prompt, translation expected.
  #[serde(rename = "cz_to_lang")]
  SourceToTarget,
  /// Translation prompt, Czech expected.
  #[serde(rename = "lang_to_cz")]
  TargetToSource,
}

impl FromStr for Direction {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cz_to_lang" | "source_to_target" => Ok(Direction::SourceToTarget),
      "lang_to_cz" | "target_to_source" => Ok(Direction::TargetToSource),
      other => Err(format!("unknown direction '{other}'")),
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
  #[default]
  Random,
  SpecificAll,
  SpecificSelected,
}

/// Outcome of one graded answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrainingResult {
  pub question: String,
  pub user_answer: String,
  pub is_correct: bool,
  pub correct_answer: String,
  pub xp_earned: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
  #[serde(rename = "M")]
  Male,
  #[serde(rename = "F")]
  Female,
  #[serde(rename = "N")]
  Unspecified,
}

/// Account as returned by the session/login/profile endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
  pub username: String,
  #[serde(default)]
  pub xp: u64,
  #[serde(default)]
  pub gender: Option<Gender>,
  #[serde(default)]
  pub avatar: Option<String>,
  #[serde(default, deserialize_with = "de_egg_set")]
  pub found_easter_eggs: BTreeSet<String>,
  #[serde(default)]
  pub streak: Option<u32>,
}

/// Leaderboard row as served by the initial-data endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct LeaderboardEntry {
  pub username: String,
  #[serde(default)]
  pub xp: u64,
  #[serde(default, deserialize_with = "de_egg_set")]
  pub found_easter_eggs: BTreeSet<String>,
}

/// Response of the XP endpoint. The server is authoritative: values are copied, never
/// recomputed locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct XpUpdate {
  pub new_xp: u64,
  #[serde(default)]
  pub new_streak: Option<u32>,
}

/// The egg set arrives as a JSON-encoded string (`"[\"gold\"]"`). Arrays are accepted
/// too; anything unparsable becomes the empty set.
fn de_egg_set<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<String>, D::Error> {
  let raw = serde_json::Value::deserialize(deserializer)?;
  Ok(parse_egg_set(&raw))
}

pub fn parse_egg_set(raw: &serde_json::Value) -> BTreeSet<String> {
  match raw {
    serde_json::Value::String(s) => serde_json::from_str::<Vec<String>>(s)
      .map(|v| v.into_iter().collect())
      .unwrap_or_default(),
    serde_json::Value::Array(items) => items
      .iter()
      .filter_map(|v| v.as_str().map(str::to_string))
      .collect(),
    _ => BTreeSet::new(),
  }
}
