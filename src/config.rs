//! Loading the client configuration from TOML plus environment overrides.
//!
//! Schema (every key optional):
//!
//! ```toml
//! api_base_url = "http://127.0.0.1:5000"
//! timeout_secs = 15
//! language = "ua"
//!
//! [pacing]
//! correct_ms = 1200
//! incorrect_ms = 2000
//! search_debounce_ms = 300
//!
//! [[ranks]]
//! min_level = 1
//! emoji = "🥉"
//! title = "Nováček"
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::Language;
use crate::error::ConfigError;
use crate::level::{Rank, RankTable};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  pub api_base_url: String,
  pub timeout_secs: u64,
  pub language: Language,
  pub pacing: Pacing,
  /// Empty means the built-in table.
  pub ranks: Vec<Rank>,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      api_base_url: "http://127.0.0.1:5000".into(),
      timeout_secs: 15,
      language: Language::default(),
      pacing: Pacing::default(),
      ranks: Vec::new(),
    }
  }
}

/// How long answer feedback stays on screen before the next question, and how long
/// global search waits for typing to settle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Pacing {
  pub correct_ms: u64,
  pub incorrect_ms: u64,
  pub search_debounce_ms: u64,
}

impl Default for Pacing {
  fn default() -> Self {
    Self { correct_ms: 1200, incorrect_ms: 2000, search_debounce_ms: 300 }
  }
}

impl Pacing {
  pub fn delay(&self, correct: bool) -> Duration {
    Duration::from_millis(if correct { self.correct_ms } else { self.incorrect_ms })
  }

  pub fn search_debounce(&self) -> Duration {
    Duration::from_millis(self.search_debounce_ms)
  }

  /// No waiting at all; used by tests and scripted runs.
  pub fn immediate() -> Self {
    Self { correct_ms: 0, incorrect_ms: 0, search_debounce_ms: 0 }
  }
}

impl ClientConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  pub fn rank_table(&self) -> RankTable {
    if self.ranks.is_empty() {
      return RankTable::default();
    }
    // Validated when parsed; fall back if someone built the struct by hand.
    RankTable::new(self.ranks.clone()).unwrap_or_default()
  }

  /// Applies API_BASE_URL, API_TIMEOUT_SECS and SLOVICKA_LANG from `lookup`.
  pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(url) = lookup("API_BASE_URL").filter(|s| !s.trim().is_empty()) {
      self.api_base_url = url.trim().to_string();
    }
    if let Some(raw) = lookup("API_TIMEOUT_SECS") {
      match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => self.timeout_secs = secs,
        _ => warn!(target: "slovicka", value = %raw, "Ignoring invalid API_TIMEOUT_SECS"),
      }
    }
    if let Some(raw) = lookup("SLOVICKA_LANG") {
      match raw.parse::<Language>() {
        Ok(lang) => self.language = lang,
        Err(e) => warn!(target: "slovicka", error = %e, "Ignoring invalid SLOVICKA_LANG"),
      }
    }
    self
  }
}

/// Parses and validates a TOML document.
pub fn parse_client_config(s: &str) -> Result<ClientConfig, ConfigError> {
  let cfg: ClientConfig = toml::from_str(s)?;
  if !cfg.ranks.is_empty() {
    RankTable::new(cfg.ranks.clone()).map_err(ConfigError::InvalidRanks)?;
  }
  Ok(cfg)
}

pub fn read_client_config(path: &str) -> Result<ClientConfig, ConfigError> {
  let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_string(), source })?;
  parse_client_config(&s)
}

/// Loads the file named by SLOVICKA_CONFIG_PATH (defaults on any error), then applies
/// environment overrides.
pub fn load_client_config_from_env() -> ClientConfig {
  let base = match std::env::var("SLOVICKA_CONFIG_PATH") {
    Ok(path) => match read_client_config(&path) {
      Ok(cfg) => {
        info!(target: "slovicka", %path, "Loaded client config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "slovicka", %path, error = %e, "Failed to load client config; using defaults");
        ClientConfig::default()
      }
    },
    Err(_) => ClientConfig::default(),
  };
  base.apply_overrides(|k| std::env::var(k).ok())
}
