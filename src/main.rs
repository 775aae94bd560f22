//! Slovíčka · console front end
//!
//! - Drives the trainer core against the remote API over stdin/stdout
//! - Screens are printed as they are attached; answers are typed as plain lines
//!
//! Important env variables:
//!   API_BASE_URL         : remote API root (default "http://127.0.0.1:5000")
//!   API_TIMEOUT_SECS     : per-request timeout (default 15)
//!   SLOVICKA_LANG        : "ua" (default), "ru" or "en"
//!   SLOVICKA_CONFIG_PATH : path to TOML config (pacing, rank table)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument, warn};

use slovicka::actions::ActionRegistry;
use slovicka::api::HttpBackend;
use slovicka::app::App;
use slovicka::config::load_client_config_from_env;
use slovicka::dictionary::LectureLabel;
use slovicka::domain::{Gender, Language};
use slovicka::grading::AnswerDiff;
use slovicka::keyboard::CzechKeyboard;
use slovicka::navigation::{screens, Markup, ScreenId, Stage};
use slovicka::presenter::{
  AnswerView, DictionaryView, LectureMenu, Notice, Presenter, ResultsView,
};
use slovicka::profile::{AvatarView, EggBadge, LeaderboardRow, ProfileView};
use slovicka::telemetry;
use slovicka::training::{Feedback, Question};

/// Screen id, title, and the action names offered there.
const SCREENS: &[(&str, &str, &[&str])] = &[
  (screens::WELCOME, "Vítejte! (:login NAME PIN, :register NAME PIN)", &[]),
  (screens::LOGIN, "Login (:login NAME PIN)", &[]),
  (screens::REGISTER, "Register (:register NAME PIN)", &[]),
  (
    screens::MAIN_MENU,
    "Main menu (:go profile-screen, :go settings-screen, :lang CODE)",
    &["start-random-training", "start-specific-training", "show-dictionary", "logout"],
  ),
  (screens::PROFILE, "Profile (:view NAME, :egg NAME)", &["prev-avatar", "next-avatar", "activate-macan-egg"]),
  (screens::VIEW_PROFILE, "Profile", &[]),
  (screens::SETTINGS, "Settings (:gender M|F, :pin NEW)", &["logout"]),
  (
    screens::LECTURE_SELECTION,
    "Lectures (:search TERM)",
    &["select-lecture", "start-selected-lectures-training", "start-all-lectures-training"],
  ),
  (screens::DICTIONARY_VIEW, "Dictionary (:filter TERM)", &["back-to-dict-select"]),
  (screens::DIRECTION_SELECTION, "Direction", &["set-direction"]),
  (screens::TRAINING, "Training (type the answer, :key N, :shift)", &["finish-training", "back-to-train-select"]),
  (screens::RESULTS, "Results", &["start-random-training", "start-specific-training"]),
  (screens::SPECIAL_EGG, "Macan!", &[]),
];

fn templates() -> HashMap<ScreenId, Markup> {
  SCREENS
    .iter()
    .map(|(id, title, actions)| {
      let mut markup = format!("== {title} ==");
      if !actions.is_empty() {
        markup.push_str(&format!("\n   actions: {}", actions.join(", ")));
      }
      (ScreenId::from(*id), markup)
    })
    .collect()
}

/// Prints screens as they are attached; transitions take no time on a terminal.
struct ConsoleStage;

#[async_trait]
impl Stage for ConsoleStage {
  async fn exit(&self, screen: &ScreenId) {
    debug!(target: "navigation", %screen, "Console screen left");
  }

  fn attach(&self, _screen: &ScreenId, markup: &Markup) {
    println!("\n{markup}");
  }

  async fn enter(&self, _screen: &ScreenId) {}
}

struct ConsolePresenter;

/// Found eggs by name, the rest as "?".
fn egg_line(eggs: &[EggBadge]) -> String {
  eggs
    .iter()
    .map(|e| if e.found { e.name } else { "?" })
    .collect::<Vec<&str>>()
    .join(" ")
}

fn print_diff(diff: &AnswerDiff) -> String {
  match diff {
    AnswerDiff::Empty { correct } => format!("(empty) -> {correct}"),
    AnswerDiff::Compared { chars, correct } => {
      let marked: String = chars
        .iter()
        .map(|c| match (c.ch, c.matches) {
          (Some(ch), true) => ch.to_string(),
          (Some(ch), false) => format!("[{ch}]"),
          (None, _) => "_".to_string(),
        })
        .collect();
      format!("{marked} -> {correct}")
    }
  }
}

impl Presenter for ConsolePresenter {
  fn notice(&self, notice: &Notice) {
    println!("! {notice}");
  }

  fn show_header(&self, username: Option<&str>) {
    if let Some(name) = username {
      println!("[{name}]");
    }
  }

  fn show_question(&self, q: &Question) {
    let marker = if q.adjective_marker { " (adj.)" } else { "" };
    println!("{}  {}{marker}", q.progress_label(), q.prompt);
  }

  fn show_keyboard(&self, keyboard: &CzechKeyboard) {
    let (top, bottom) = keyboard.rows();
    let line = |keys: &[char], offset: usize| {
      keys
        .iter()
        .enumerate()
        .map(|(i, k)| format!("{}:{k}", i + offset))
        .collect::<Vec<_>>()
        .join(" ")
    };
    println!("   {}\n   {}", line(top, 0), line(bottom, top.len()));
  }

  fn show_feedback(&self, f: &Feedback) {
    if f.is_correct {
      println!("✓ +{} XP", f.xp_earned);
    } else {
      println!("✗ {}", f.correct_answer);
    }
  }

  fn show_results(&self, results: &ResultsView) {
    match results {
      ResultsView::NoAnswers => println!("No answers given."),
      ResultsView::Scored { correct, total, xp, rows } => {
        println!("{correct} / {total} correct, +{xp} XP");
        for row in rows {
          let answer = match &row.answer {
            AnswerView::Correct(text) => text.clone(),
            AnswerView::Diff(diff) => print_diff(diff),
          };
          println!("{:>3}. {}  {answer}", row.position, row.result.question);
        }
      }
    }
  }

  fn show_profile(&self, p: &ProfileView) {
    println!(
      "{} {} · level {} ({}/{}, {:.0}%) · {}",
      p.rank.emoji,
      p.username,
      p.level.level,
      p.level.progress,
      p.level.needed,
      p.level.fraction() * 100.0,
      p.xp_label()
    );
    match &p.avatar {
      AvatarView::Unavailable => println!("   avatar: -"),
      AvatarView::Image { file, display_name } => {
        println!("   avatar: {}", display_name.as_deref().unwrap_or(file));
      }
    }
    println!("   eggs: {}", egg_line(&p.eggs));
  }

  fn show_leaderboard(&self, rows: &[LeaderboardRow]) {
    for r in rows {
      let crown = if r.crown { " 👑" } else { "" };
      let me = if r.is_current_user { " *" } else { "" };
      println!("{:>3}. {} {}{crown} · L{} · {} XP{me}", r.position, r.rank_emoji, r.username, r.level, r.xp);
    }
  }

  fn show_lectures(&self, menu: &LectureMenu) {
    let items: Vec<String> = menu
      .lectures
      .iter()
      .map(|id| {
        let mark = if menu.selected.contains(id) { "*" } else { "" };
        format!("{}={}{mark}", id, LectureLabel::from(*id))
      })
      .collect();
    println!("   {}", items.join("  "));
    if menu.shows_start_button() && !menu.selected.is_empty() {
      println!("   ready: start-selected-lectures-training");
    }
  }

  fn show_dictionary(&self, view: &DictionaryView) {
    println!("-- {} --", LectureLabel::from(view.lecture));
    for e in &view.entries {
      let star = if e.special { " ★" } else { "" };
      println!("{:>3}. {} = {}{star}", e.number, e.cz, e.translation);
    }
    if view.notebook_egg_found == Some(false) {
      println!("   (:egg lazurit)");
    }
  }

  fn show_search_results(&self, hits: &[slovicka::dictionary::SearchHit]) {
    for h in hits {
      println!("   [{}] {} = {}", h.lecture, h.cz, h.translation);
    }
  }

  fn show_settings(&self, gender: Option<Gender>) {
    println!("   gender: {}", gender.map_or("-", |g| if g == Gender::Female { "F" } else { "M" }));
  }

  fn start_effect(&self, egg: &str) {
    println!("♪ {egg}");
  }

  fn stop_effects(&self) {
    println!("♪ -");
  }
}

/// Handles one `:command`; returns false on `:quit`.
#[instrument(level = "debug", target = "slovicka", skip(app, registry, draft))]
async fn run_command(app: &Arc<App>, registry: &ActionRegistry, line: &str, draft: &mut String) -> bool {
  let mut parts = line.split_whitespace();
  let cmd = parts.next().unwrap_or_default();
  let first = parts.next();
  let second = parts.next();
  match (cmd, first, second) {
    (":quit", _, _) => return false,
    (":a", Some(name), arg) => match registry.resolve(name, arg) {
      Ok(action) => app.dispatch(action).await,
      Err(e) => println!("! {e}"),
    },
    (":login", Some(user), Some(pin)) => {
      if let Err(e) = app.login(user, pin).await {
        debug!(target: "slovicka", error = %e, "Login rejected");
      }
    }
    (":register", Some(user), Some(pin)) => {
      if let Err(e) = app.register(user, pin).await {
        debug!(target: "slovicka", error = %e, "Registration rejected");
      }
    }
    (":go", Some(screen), _) => {
      app.navigate(screen).await;
    }
    (":search", term, _) => app.global_search(term.unwrap_or_default()),
    (":filter", term, _) => app.filter_dictionary(term.unwrap_or_default()),
    (":lang", Some(code), _) => match code.parse::<Language>() {
      Ok(lang) => app.set_language(lang).await,
      Err(e) => println!("! {e}"),
    },
    (":gender", Some(g), _) => match g {
      "M" | "m" => app.change_gender(Gender::Male).await,
      "F" | "f" => app.change_gender(Gender::Female).await,
      other => println!("! unknown gender {other}"),
    },
    (":pin", Some(pin), _) => {
      if let Err(e) = app.change_pin(pin).await {
        debug!(target: "slovicka", error = %e, "PIN change rejected");
      }
    }
    (":view", Some(user), _) => {
      if let Err(e) = app.view_user_profile(user).await {
        debug!(target: "slovicka", error = %e, "Profile lookup failed");
      }
    }
    (":egg", Some(name), _) => {
      app.activate_egg(name).await;
    }
    (":shift", _, _) => app.toggle_shift(),
    (":key", Some(n), _) => match n.parse::<usize>().ok().and_then(|i| app.type_special(draft, i)) {
      Some(text) => {
        *draft = text;
        println!("   > {draft}");
      }
      None => println!("! no key {n}"),
    },
    _ => println!("! unknown command; actions: {}", registry.names().collect::<Vec<_>>().join(", ")),
  }
  true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = load_client_config_from_env();
  let registry = ActionRegistry::default();
  registry.validate(SCREENS.iter().flat_map(|(_, _, actions)| actions.iter().copied()))?;

  let backend = Arc::new(HttpBackend::from_config(&config)?);
  info!(target: "slovicka", base_url = %backend.base_url(), "Using remote API");

  let app = App::new(config, backend, Arc::new(ConsoleStage), Arc::new(templates()), Arc::new(ConsolePresenter));
  app.check_session().await;

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let mut draft = String::new();
  while let Some(line) = lines.next_line().await? {
    let line = line.trim();
    if line.starts_with(':') {
      if !run_command(&app, &registry, line, &mut draft).await {
        break;
      }
    } else if app.navigator().is_showing(screens::TRAINING) {
      let answer = format!("{draft}{line}");
      draft.clear();
      app.submit_answer(&answer).await;
    } else if !line.is_empty() {
      warn!(target: "slovicka", "Plain input outside training; use :a ACTION or :quit");
    }
  }
  info!(target: "slovicka", "Bye");
  Ok(())
}
