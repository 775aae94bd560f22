//! User actions and the name → action registry front ends bind against.

use std::collections::BTreeMap;

use crate::domain::Direction;
use crate::error::ActionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
  StartRandomTraining,
  StartSpecificTraining,
  ShowDictionary,
  /// Toggles a lecture (training) or opens it (dictionary).
  SelectLecture(u32),
  StartSelectedLecturesTraining,
  /// Trains every lecture from the lecture list.
  StartAllLecturesTraining,
  SetDirection(Direction),
  FinishTraining,
  Logout,
  BackToDictSelect,
  BackToTrainSelect,
  PrevAvatar,
  NextAvatar,
  ActivateSpecialEgg,
}

type Parser = fn(Option<&str>) -> Result<Action, ActionError>;

fn select_lecture(arg: Option<&str>) -> Result<Action, ActionError> {
  let raw = arg.ok_or(ActionError::MissingArgument("select-lecture"))?;
  raw
    .trim()
    .parse()
    .map(Action::SelectLecture)
    .map_err(|_| ActionError::InvalidArgument { action: "select-lecture", value: raw.to_string() })
}

fn set_direction(arg: Option<&str>) -> Result<Action, ActionError> {
  let raw = arg.ok_or(ActionError::MissingArgument("set-direction"))?;
  raw
    .trim()
    .parse()
    .map(Action::SetDirection)
    .map_err(|_| ActionError::InvalidArgument { action: "set-direction", value: raw.to_string() })
}

/// Action name → parser, built once at start-up.
pub struct ActionRegistry {
  parsers: BTreeMap<&'static str, Parser>,
}

impl Default for ActionRegistry {
  fn default() -> Self {
    let mut parsers: BTreeMap<&'static str, Parser> = BTreeMap::new();
    parsers.insert("start-random-training", |_| Ok(Action::StartRandomTraining));
    parsers.insert("start-specific-training", |_| Ok(Action::StartSpecificTraining));
    parsers.insert("show-dictionary", |_| Ok(Action::ShowDictionary));
    parsers.insert("select-lecture", select_lecture);
    parsers.insert("start-selected-lectures-training", |_| Ok(Action::StartSelectedLecturesTraining));
    parsers.insert("start-all-lectures-training", |_| Ok(Action::StartAllLecturesTraining));
    parsers.insert("set-direction", set_direction);
    parsers.insert("finish-training", |_| Ok(Action::FinishTraining));
    parsers.insert("logout", |_| Ok(Action::Logout));
    parsers.insert("back-to-dict-select", |_| Ok(Action::BackToDictSelect));
    parsers.insert("back-to-train-select", |_| Ok(Action::BackToTrainSelect));
    parsers.insert("prev-avatar", |_| Ok(Action::PrevAvatar));
    parsers.insert("next-avatar", |_| Ok(Action::NextAvatar));
    parsers.insert("activate-macan-egg", |_| Ok(Action::ActivateSpecialEgg));
    Self { parsers }
  }
}

impl ActionRegistry {
  pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.parsers.keys().copied()
  }

  /// Checks that every name a front end binds is registered.
  pub fn validate<'a>(&self, bound: impl IntoIterator<Item = &'a str>) -> Result<(), ActionError> {
    match bound.into_iter().find(|name| !self.parsers.contains_key(*name)) {
      Some(unknown) => Err(ActionError::Unknown(unknown.to_string())),
      None => Ok(()),
    }
  }

  pub fn resolve(&self, name: &str, arg: Option<&str>) -> Result<Action, ActionError> {
    let parse = self
      .parsers
      .get(name)
      .ok_or_else(|| ActionError::Unknown(name.to_string()))?;
    parse(arg)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolves_names_with_arguments() {
    let reg = ActionRegistry::default();
    assert_eq!(reg.resolve("select-lecture", Some("0")), Ok(Action::SelectLecture(0)));
    assert_eq!(
      reg.resolve("set-direction", Some("lang_to_cz")),
      Ok(Action::SetDirection(Direction::TargetToSource))
    );
    assert_eq!(reg.resolve("activate-macan-egg", None), Ok(Action::ActivateSpecialEgg));
  }

  #[test]
  fn rejects_unknown_names_and_bad_arguments() {
    let reg = ActionRegistry::default();
    assert_eq!(reg.resolve("fly", None), Err(ActionError::Unknown("fly".into())));
    assert_eq!(reg.resolve("select-lecture", None), Err(ActionError::MissingArgument("select-lecture")));
    assert!(matches!(
      reg.resolve("set-direction", Some("sideways")),
      Err(ActionError::InvalidArgument { action: "set-direction", .. })
    ));
  }

  #[test]
  fn validate_reports_first_unbound_name() {
    let reg = ActionRegistry::default();
    assert_eq!(reg.names().count(), 14);
    assert!(reg.validate(["logout", "next-avatar"]).is_ok());
    assert_eq!(reg.validate(["logout", "dance"]), Err(ActionError::Unknown("dance".into())));
  }
}
