//! XP → level curve and the level → rank step table.

use serde::Deserialize;

/// XP needed to complete level 1.
pub const BASE_LEVEL_XP: u64 = 100;
/// Per-level growth of the requirement.
pub const LEVEL_GROWTH: f64 = 1.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelProgress {
  pub level: u32,
  /// XP earned inside the current level.
  pub progress: u64,
  /// XP required to complete the current level.
  pub needed: u64,
}

impl LevelProgress {
  /// Fill ratio of the XP bar, 0.0..1.0.
  pub fn fraction(&self) -> f64 {
    if self.needed == 0 { 0.0 } else { self.progress as f64 / self.needed as f64 }
  }
}

/// Requirement of `level`: `floor(100 * 1.2^(level-1))`.
pub fn xp_needed_for(level: u32) -> u64 {
  (BASE_LEVEL_XP as f64 * LEVEL_GROWTH.powf(level.saturating_sub(1) as f64)).floor() as u64
}

pub fn xp_to_level(xp: u64) -> LevelProgress {
  let mut level = 1;
  let mut start = 0u64;
  let mut needed = BASE_LEVEL_XP;
  // A level end past u64::MAX is unreachable, so overflow ends the walk.
  while let Some(end) = start.checked_add(needed).filter(|&end| xp >= end) {
    start = end;
    level += 1;
    needed = xp_needed_for(level);
  }
  LevelProgress { level, progress: xp - start, needed }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Rank {
  pub min_level: u32,
  pub emoji: String,
  pub title: String,
}

impl Rank {
  fn new(min_level: u32, emoji: &str, title: &str) -> Self {
    Self { min_level, emoji: emoji.into(), title: title.into() }
  }
}

/// Ascending rank thresholds; the first one starts at level 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankTable {
  ranks: Vec<Rank>,
}

impl Default for RankTable {
  fn default() -> Self {
    Self {
      ranks: vec![
        Rank::new(1, "🥉", "Nováček"),
        Rank::new(5, "🥈", "Učedník"),
        Rank::new(12, "🥇", "Znalec"),
        Rank::new(20, "🏆", "Mistr"),
        Rank::new(30, "💎", "Polyglot"),
      ],
    }
  }
}

impl RankTable {
  /// Validates and wraps a custom table.
  pub fn new(ranks: Vec<Rank>) -> Result<Self, String> {
    let Some(first) = ranks.first() else {
      return Err("at least one rank is required".into());
    };
    if first.min_level != 1 {
      return Err(format!("first rank must start at level 1, not {}", first.min_level));
    }
    if let Some(w) = ranks.windows(2).find(|w| w[0].min_level >= w[1].min_level) {
      return Err(format!(
        "thresholds must ascend strictly ({} then {})",
        w[0].min_level, w[1].min_level
      ));
    }
    Ok(Self { ranks })
  }

  /// Highest rank whose threshold does not exceed `level`.
  pub fn rank_for(&self, level: u32) -> &Rank {
    self
      .ranks
      .iter()
      .take_while(|r| r.min_level <= level)
      .last()
      .unwrap_or(&self.ranks[0])
  }
}

/// Rank from the default table.
pub fn get_rank(level: u32) -> Rank {
  RankTable::default().rank_for(level).clone()
}
