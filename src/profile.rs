//! Logged-in user, profile and leaderboard views, avatars and easter eggs.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::domain::{Gender, LeaderboardEntry, UserProfile, XpUpdate};
use crate::level::{xp_to_level, LevelProgress, Rank, RankTable};
use crate::protocol::AvatarLists;

/// Display order of the unlockable effects.
pub const EASTER_EGG_ORDER: [&str; 6] = ["emerald", "gold", "lazurit", "redstone", "diamond", "macan"];
pub const TOTAL_EASTER_EGGS: usize = EASTER_EGG_ORDER.len();
/// Effect started by the hidden dictionary entry.
pub const SPECIAL_EGG: &str = "macan";
/// Effect hidden on the notebook dictionary page.
pub const NOTEBOOK_EGG: &str = "lazurit";

pub fn is_known_egg(name: &str) -> bool {
  EASTER_EGG_ORDER.contains(&name)
}

pub fn has_all_eggs(found: &BTreeSet<String>) -> bool {
  found.len() >= TOTAL_EASTER_EGGS
}

/// Profile of the logged-in user, shared by the training engine and the app.
#[derive(Default)]
pub struct CurrentUser {
  profile: Mutex<Option<UserProfile>>,
}

impl CurrentUser {
  fn lock(&self) -> MutexGuard<'_, Option<UserProfile>> {
    self.profile.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn get(&self) -> Option<UserProfile> {
    self.lock().clone()
  }

  pub fn set(&self, profile: Option<UserProfile>) {
    *self.lock() = profile;
  }

  pub fn username(&self) -> Option<String> {
    self.lock().as_ref().map(|p| p.username.clone())
  }

  /// Runs `f` on the profile if someone is logged in.
  pub fn update<R>(&self, f: impl FnOnce(&mut UserProfile) -> R) -> Option<R> {
    self.lock().as_mut().map(f)
  }

  /// Copies the server totals; the delta is never added locally.
  pub fn apply_xp(&self, update: XpUpdate) {
    self.update(|p| {
      p.xp = update.new_xp;
      if update.new_streak.is_some() {
        p.streak = update.new_streak;
      }
    });
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EggBadge {
  pub name: &'static str,
  pub found: bool,
}

pub fn egg_badges(found: &BTreeSet<String>) -> Vec<EggBadge> {
  EASTER_EGG_ORDER
    .iter()
    .map(|&name| EggBadge { name, found: found.contains(name) })
    .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AvatarView {
  Unavailable,
  Image {
    file: String,
    /// Hidden on other users' profiles.
    display_name: Option<String>,
  },
}

fn gender_code(gender: Gender) -> &'static str {
  match gender {
    Gender::Male => "M",
    Gender::Female => "F",
    Gender::Unspecified => "N",
  }
}

/// `M_wizard.png` → `wizard`.
pub fn avatar_display_name(file: &str, gender: Gender) -> String {
  let prefix = format!("{}_", gender_code(gender));
  let name = file.strip_prefix(prefix.as_str()).unwrap_or(file);
  let name = name
    .strip_suffix(".png")
    .or_else(|| name.strip_suffix(".jpg"))
    .unwrap_or(name);
  name.to_string()
}

pub fn avatar_view(user: &UserProfile, avatars: &AvatarLists, readonly: bool) -> AvatarView {
  let (Some(gender), Some(avatar)) = (user.gender, user.avatar.as_deref()) else {
    return AvatarView::Unavailable;
  };
  if !avatars.for_gender(gender).iter().any(|a| a == avatar) {
    return AvatarView::Unavailable;
  }
  AvatarView::Image {
    file: avatar.to_string(),
    display_name: (!readonly).then(|| avatar_display_name(avatar, gender)),
  }
}

/// Steps `step` places through `list` from `current`, wrapping at both ends. An avatar
/// not in the list counts as index 0.
pub fn cycle_avatar(list: &[String], current: Option<&str>, step: isize) -> Option<String> {
  if list.is_empty() {
    return None;
  }
  let idx = current.and_then(|c| list.iter().position(|a| a == c)).unwrap_or(0);
  let next = (idx as isize + step).rem_euclid(list.len() as isize) as usize;
  Some(list[next].clone())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileView {
  pub username: String,
  pub xp: u64,
  pub level: LevelProgress,
  pub rank: Rank,
  pub avatar: AvatarView,
  pub eggs: Vec<EggBadge>,
  /// Another user's profile: no avatar controls, eggs not clickable.
  pub readonly: bool,
}

impl ProfileView {
  pub fn build(user: &UserProfile, ranks: &RankTable, avatars: &AvatarLists, readonly: bool) -> Self {
    let level = xp_to_level(user.xp);
    Self {
      username: user.username.clone(),
      xp: user.xp,
      level,
      rank: ranks.rank_for(level.level).clone(),
      avatar: avatar_view(user, avatars, readonly),
      eggs: egg_badges(&user.found_easter_eggs),
      readonly,
    }
  }

  pub fn xp_label(&self) -> String {
    format!("{} / {} XP", self.level.progress, self.level.needed)
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardRow {
  /// 1-based.
  pub position: usize,
  pub username: String,
  pub xp: u64,
  pub level: u32,
  pub rank_emoji: String,
  /// Found every easter egg.
  pub crown: bool,
  pub is_current_user: bool,
}

impl LeaderboardRow {
  /// Rows other than the current user's open that user's profile.
  pub fn clickable(&self) -> bool {
    !self.is_current_user
  }
}

pub fn leaderboard_rows(entries: &[LeaderboardEntry], ranks: &RankTable, current: Option<&str>) -> Vec<LeaderboardRow> {
  entries
    .iter()
    .enumerate()
    .map(|(i, e)| {
      let level = xp_to_level(e.xp).level;
      LeaderboardRow {
        position: i + 1,
        username: e.username.clone(),
        xp: e.xp,
        level,
        rank_emoji: ranks.rank_for(level).emoji.clone(),
        crown: has_all_eggs(&e.found_easter_eggs),
        is_current_user: current == Some(e.username.as_str()),
      }
    })
    .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EggToggle {
  Started,
  /// The effect was already playing and has been stopped.
  Stopped,
}

/// Which effect is currently playing, if any.
#[derive(Default)]
pub struct EffectState {
  playing: Mutex<Option<String>>,
}

impl EffectState {
  /// Stops `egg` if it is playing, otherwise makes it the playing effect.
  pub fn toggle(&self, egg: &str) -> EggToggle {
    let mut playing = self.playing.lock().unwrap_or_else(PoisonError::into_inner);
    if playing.as_deref() == Some(egg) {
      *playing = None;
      debug!(target: "slovicka", egg, "Effect stopped");
      EggToggle::Stopped
    } else {
      *playing = Some(egg.to_string());
      debug!(target: "slovicka", egg, "Effect started");
      EggToggle::Started
    }
  }

  pub fn stop(&self) -> Option<String> {
    self.playing.lock().unwrap_or_else(PoisonError::into_inner).take()
  }

  pub fn playing(&self) -> Option<String> {
    self.playing.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn avatars() -> AvatarLists {
    AvatarLists {
      male: vec!["M_knight.png".into(), "M_wizard.jpg".into(), "M_bard.png".into()],
      female: vec!["F_queen.png".into()],
    }
  }

  fn eggs(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn avatar_names_drop_gender_prefix_and_extension() {
    assert_eq!(avatar_display_name("M_wizard.jpg", Gender::Male), "wizard");
    assert_eq!(avatar_display_name("F_queen.png", Gender::Female), "queen");
    assert_eq!(avatar_display_name("odd.gif", Gender::Male), "odd.gif");
  }

  #[test]
  fn cycling_wraps_both_ways() {
    let list = avatars().male;
    assert_eq!(cycle_avatar(&list, Some("M_bard.png"), 1).as_deref(), Some("M_knight.png"));
    assert_eq!(cycle_avatar(&list, Some("M_knight.png"), -1).as_deref(), Some("M_bard.png"));
    assert_eq!(cycle_avatar(&list, Some("gone.png"), 1).as_deref(), Some("M_wizard.jpg"));
    assert_eq!(cycle_avatar(&[], Some("x"), 1), None);
  }

  #[test]
  fn avatar_unavailable_without_gender_or_known_file() {
    let mut user = UserProfile { username: "eva".into(), ..Default::default() };
    assert_eq!(avatar_view(&user, &avatars(), false), AvatarView::Unavailable);

    user.gender = Some(Gender::Female);
    user.avatar = Some("M_knight.png".into());
    assert_eq!(avatar_view(&user, &avatars(), false), AvatarView::Unavailable);

    user.avatar = Some("F_queen.png".into());
    assert_eq!(
      avatar_view(&user, &avatars(), false),
      AvatarView::Image { file: "F_queen.png".into(), display_name: Some("queen".into()) }
    );
    assert_eq!(
      avatar_view(&user, &avatars(), true),
      AvatarView::Image { file: "F_queen.png".into(), display_name: None }
    );
  }

  #[test]
  fn leaderboard_marks_crowns_and_current_user() {
    let entries = vec![
      LeaderboardEntry { username: "adam".into(), xp: 5000, found_easter_eggs: eggs(&EASTER_EGG_ORDER) },
      LeaderboardEntry { username: "eva".into(), xp: 120, found_easter_eggs: eggs(&["gold"]) },
    ];
    let rows = leaderboard_rows(&entries, &RankTable::default(), Some("eva"));
    assert_eq!(rows[0].position, 1);
    assert!(rows[0].crown);
    assert!(rows[0].clickable());
    assert!(rows[0].level > 5);
    assert_eq!(rows[1].level, 2);
    assert_eq!(rows[1].rank_emoji, "🥉");
    assert!(!rows[1].crown);
    assert!(!rows[1].clickable());
  }

  #[test]
  fn profile_view_derives_level_rank_and_badges() {
    let user = UserProfile {
      username: "eva".into(),
      xp: 130,
      found_easter_eggs: eggs(&["diamond"]),
      ..Default::default()
    };
    let view = ProfileView::build(&user, &RankTable::default(), &avatars(), false);
    assert_eq!(view.level.level, 2);
    assert_eq!(view.xp_label(), "30 / 120 XP");
    assert_eq!(view.rank.title, "Nováček");
    assert_eq!(view.eggs.len(), TOTAL_EASTER_EGGS);
    assert_eq!(view.eggs.iter().filter(|b| b.found).map(|b| b.name).collect::<Vec<_>>(), vec!["diamond"]);
  }

  #[test]
  fn xp_update_overwrites_cached_totals() {
    let user = CurrentUser::default();
    user.apply_xp(XpUpdate { new_xp: 10, new_streak: None });
    assert!(user.get().is_none());

    user.set(Some(UserProfile { username: "eva".into(), xp: 3, streak: Some(2), ..Default::default() }));
    user.apply_xp(XpUpdate { new_xp: 500, new_streak: None });
    assert_eq!(user.get().unwrap().xp, 500);
    assert_eq!(user.get().unwrap().streak, Some(2));
    user.apply_xp(XpUpdate { new_xp: 512, new_streak: Some(3) });
    assert_eq!(user.get().unwrap().streak, Some(3));
  }

  #[test]
  fn effect_toggle_stops_the_same_egg() {
    let fx = EffectState::default();
    assert_eq!(fx.toggle("gold"), EggToggle::Started);
    assert_eq!(fx.toggle("emerald"), EggToggle::Started);
    assert_eq!(fx.playing().as_deref(), Some("emerald"));
    assert_eq!(fx.toggle("emerald"), EggToggle::Stopped);
    assert_eq!(fx.playing(), None);
  }
}
