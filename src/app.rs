//! Session-scoped application context.
//!
//! `App` wires the navigator, the training engine and the remote API together and owns
//! the per-login UI state (selected lectures, dictionary lecture, viewed profile). It is
//! built once at start-up; `logout` tears the login-scoped parts (word cache, training
//! session, profile) down again.
//!
//! Screens get their content from a setup table keyed by screen id, run from the
//! navigator's lifecycle hook as soon as the markup is attached.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::actions::Action;
use crate::api::Backend;
use crate::cache::WordCache;
use crate::config::ClientConfig;
use crate::dictionary::{filter_dictionary, search_hits};
use crate::domain::{
    Direction, Gender, Language, LeaderboardEntry, LectureKey, TrainingMode, UserProfile, Word,
    NOTEBOOK_LECTURE,
};
use crate::error::{AccountError, ApiError, InputError, TrainingError};
use crate::keyboard::{insert_char, CzechKeyboard};
use crate::level::RankTable;
use crate::navigation::{screens, NavOutcome, Navigator, ScreenId, ScreenLifecycle, Stage, TemplateRegistry};
use crate::presenter::{DictionaryView, LectureMenu, Notice, Presenter, ResultsView, ViewMode};
use crate::profile::{
    cycle_avatar, is_known_egg, leaderboard_rows, CurrentUser, EffectState, EggToggle, ProfileView,
    NOTEBOOK_EGG, SPECIAL_EGG,
};
use crate::protocol::AvatarLists;
use crate::training::{Grade, QuestionState, SessionPlan, TrainingEngine};
use crate::util::{is_valid_pin, is_valid_username};

/// Content loader run when a screen's markup is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScreenSetup {
    MainMenu,
    Profile,
    Settings,
    LectureSelection,
    DictionaryView,
    Training,
    Results,
    ViewProfile,
}

fn screen_setups() -> HashMap<ScreenId, ScreenSetup> {
    [
        (screens::MAIN_MENU, ScreenSetup::MainMenu),
        (screens::PROFILE, ScreenSetup::Profile),
        (screens::SETTINGS, ScreenSetup::Settings),
        (screens::LECTURE_SELECTION, ScreenSetup::LectureSelection),
        (screens::DICTIONARY_VIEW, ScreenSetup::DictionaryView),
        (screens::TRAINING, ScreenSetup::Training),
        (screens::RESULTS, ScreenSetup::Results),
        (screens::VIEW_PROFILE, ScreenSetup::ViewProfile),
    ]
    .into_iter()
    .map(|(id, setup)| (ScreenId::from(id), setup))
    .collect()
}

#[derive(Default)]
struct UiState {
    language: Language,
    view_mode: ViewMode,
    mode: TrainingMode,
    selected_lectures: BTreeSet<u32>,
    lecture_for_view: Option<u32>,
    dictionary_term: String,
    viewing_user: Option<UserProfile>,
    // From the initial-data endpoint; kept across logins.
    lectures: Vec<u32>,
    leaderboard: Vec<LeaderboardEntry>,
    avatars: AvatarLists,
}

impl UiState {
    fn end_session(&mut self) {
        self.view_mode = ViewMode::default();
        self.mode = TrainingMode::default();
        self.selected_lectures.clear();
        self.lecture_for_view = None;
        self.dictionary_term.clear();
        self.viewing_user = None;
    }

    fn lecture_menu(&self) -> LectureMenu {
        LectureMenu {
            lectures: self.lectures.clone(),
            mode: self.view_mode,
            selected: self.selected_lectures.clone(),
        }
    }
}

fn failure_notice(e: &ApiError) -> Notice {
    match e {
        ApiError::Status { message, .. } => Notice::Failed(message.clone()),
        other => Notice::Failed(other.to_string()),
    }
}

pub struct App {
    config: ClientConfig,
    ranks: RankTable,
    backend: Arc<dyn Backend>,
    navigator: Navigator,
    presenter: Arc<dyn Presenter>,
    cache: Arc<WordCache>,
    user: Arc<CurrentUser>,
    training: TrainingEngine,
    effects: EffectState,
    keyboard: Mutex<CzechKeyboard>,
    ui: Mutex<UiState>,
    search: Mutex<Option<JoinHandle<()>>>,
    setups: HashMap<ScreenId, ScreenSetup>,
}

impl App {
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn Backend>,
        stage: Arc<dyn Stage>,
        templates: Arc<dyn TemplateRegistry>,
        presenter: Arc<dyn Presenter>,
    ) -> Arc<Self> {
        let cache = Arc::new(WordCache::new());
        let user = Arc::new(CurrentUser::default());
        let training = TrainingEngine::new(backend.clone(), cache.clone(), user.clone());
        let ui = UiState { language: config.language, ..Default::default() };
        Arc::new(Self {
            ranks: config.rank_table(),
            config,
            backend,
            navigator: Navigator::new(stage, templates).with_transient(screens::LECTURE_SELECTION),
            presenter,
            cache,
            user,
            training,
            effects: EffectState::default(),
            keyboard: Mutex::new(CzechKeyboard::default()),
            ui: Mutex::new(ui),
            search: Mutex::new(None),
            setups: screen_setups(),
        })
    }

    fn ui(&self) -> MutexGuard<'_, UiState> {
        self.ui.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn keyboard(&self) -> MutexGuard<'_, CzechKeyboard> {
        self.keyboard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn training(&self) -> &TrainingEngine {
        &self.training
    }

    pub fn word_cache(&self) -> &WordCache {
        &self.cache
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.user.get()
    }

    pub fn language(&self) -> Language {
        self.ui().language
    }

    pub fn selected_lectures(&self) -> BTreeSet<u32> {
        self.ui().selected_lectures.clone()
    }

    /// Shows `screen`. Leaving for anything but the profile viewer forgets the viewed user.
    pub async fn navigate(&self, screen: &str) -> NavOutcome {
        if screen != screens::VIEW_PROFILE && !self.navigator.is_transitioning() {
            self.ui().viewing_user = None;
        }
        self.navigator.navigate_to(ScreenId::from(screen), self).await
    }

    async fn load_initial_data(&self) {
        match self.backend.initial_data().await {
            Ok(data) => {
                let mut ui = self.ui();
                ui.lectures = data.lectures;
                ui.leaderboard = data.leaderboard;
                ui.avatars = data.avatars;
            }
            Err(e) => warn!(target: "slovicka", error = %e, "Could not load initial data"),
        }
    }

    // ---------- accounts ----------

    /// Start-up: loads shared data, restores a cookie session if one exists and shows
    /// the main menu or the welcome screen.
    #[instrument(level = "info", target = "slovicka", skip(self))]
    pub async fn check_session(&self) -> NavOutcome {
        self.load_initial_data().await;
        let user = match self.backend.session().await {
            Ok(user) => user,
            Err(e) => {
                warn!(target: "slovicka", error = %e, "Session check failed; treating as logged out");
                None
            }
        };
        let target = if user.is_some() { screens::MAIN_MENU } else { screens::WELCOME };
        self.user.set(user);
        self.presenter.show_header(self.user.username().as_deref());
        self.navigate(target).await
    }

    async fn sign_in(&self, profile: UserProfile) {
        info!(target: "slovicka", username = %profile.username, "Signed in");
        self.presenter.show_header(Some(&profile.username));
        self.user.set(Some(profile));
        self.navigate(screens::MAIN_MENU).await;
    }

    #[instrument(level = "info", target = "slovicka", skip(self, pin))]
    pub async fn login(&self, username: &str, pin: &str) -> Result<(), AccountError> {
        match self.backend.login(username.trim(), pin).await {
            Ok(profile) => {
                self.sign_in(profile).await;
                Ok(())
            }
            Err(e) => {
                self.presenter.notice(&Notice::LoginFailed);
                Err(e.into())
            }
        }
    }

    #[instrument(level = "info", target = "slovicka", skip(self, pin))]
    pub async fn register(&self, username: &str, pin: &str) -> Result<(), AccountError> {
        let username = username.trim();
        let invalid = if !is_valid_username(username) {
            Some(InputError::InvalidUsername)
        } else if !is_valid_pin(pin) {
            Some(InputError::InvalidPin)
        } else {
            None
        };
        if let Some(e) = invalid {
            self.presenter.notice(&Notice::Input(e.clone()));
            return Err(e.into());
        }

        match self.backend.register(username, pin).await {
            Ok(mut profile) => {
                profile.found_easter_eggs.clear();
                self.sign_in(profile).await;
                Ok(())
            }
            Err(e) => {
                self.presenter.notice(&failure_notice(&e));
                Err(e.into())
            }
        }
    }

    #[instrument(level = "info", target = "slovicka", skip(self))]
    pub async fn logout(&self) -> NavOutcome {
        if let Err(e) = self.backend.logout().await {
            warn!(target: "slovicka", error = %e, "Logout call failed; clearing local state anyway");
        }
        self.effects.stop();
        self.presenter.stop_effects();
        self.abort_search();
        self.user.set(None);
        self.cache.clear();
        self.training.reset();
        self.ui().end_session();
        self.presenter.show_header(None);
        info!(target: "slovicka", "Signed out");
        self.navigate(screens::WELCOME).await
    }

    #[instrument(level = "info", target = "slovicka", skip_all)]
    pub async fn change_pin(&self, new_pin: &str) -> Result<(), AccountError> {
        if !is_valid_pin(new_pin) {
            self.presenter.notice(&Notice::Input(InputError::InvalidPin));
            return Err(InputError::InvalidPin.into());
        }
        match self.backend.change_pin(new_pin).await {
            Ok(()) => {
                self.presenter.notice(&Notice::PinChanged);
                self.navigate(screens::PROFILE).await;
                Ok(())
            }
            Err(e) => {
                self.presenter.notice(&failure_notice(&e));
                Err(e.into())
            }
        }
    }

    // ---------- actions ----------

    /// Runs a user action. Ignored while a screen transition is in progress.
    #[instrument(level = "debug", target = "slovicka", skip(self))]
    pub async fn dispatch(&self, action: Action) {
        if self.navigator.is_transitioning() {
            debug!(target: "slovicka", ?action, "Transition in progress; action ignored");
            return;
        }
        match action {
            Action::StartRandomTraining => {
                self.ui().mode = TrainingMode::Random;
                self.navigate(screens::DIRECTION_SELECTION).await;
            }
            Action::StartSpecificTraining | Action::BackToTrainSelect => {
                self.ui().view_mode = ViewMode::Training;
                self.navigate(screens::LECTURE_SELECTION).await;
            }
            Action::ShowDictionary | Action::BackToDictSelect => {
                self.ui().view_mode = ViewMode::Dictionary;
                self.navigate(screens::LECTURE_SELECTION).await;
            }
            Action::SelectLecture(id) => self.select_lecture(id).await,
            Action::StartSelectedLecturesTraining => {
                let has_selection = {
                    let mut ui = self.ui();
                    let has = !ui.selected_lectures.is_empty();
                    if has {
                        ui.mode = TrainingMode::SpecificSelected;
                    }
                    has
                };
                if has_selection {
                    self.navigate(screens::DIRECTION_SELECTION).await;
                } else {
                    self.presenter.notice(&Notice::Input(InputError::NoLectureSelected));
                }
            }
            Action::StartAllLecturesTraining => {
                self.ui().mode = TrainingMode::SpecificAll;
                self.navigate(screens::DIRECTION_SELECTION).await;
            }
            Action::SetDirection(direction) => self.start_training(direction).await,
            Action::FinishTraining => {
                self.navigate(screens::RESULTS).await;
            }
            Action::Logout => {
                self.logout().await;
            }
            Action::PrevAvatar => self.change_avatar(-1).await,
            Action::NextAvatar => self.change_avatar(1).await,
            Action::ActivateSpecialEgg => {
                self.navigate(screens::SPECIAL_EGG).await;
                self.activate_egg(SPECIAL_EGG).await;
            }
        }
    }

    async fn select_lecture(&self, id: u32) {
        if !self.navigator.is_showing(screens::LECTURE_SELECTION) {
            debug!(target: "slovicka", id, "Lecture list not shown; selection ignored");
            return;
        }
        let menu = {
            let mut ui = self.ui();
            if !ui.lectures.contains(&id) {
                debug!(target: "slovicka", id, "Unknown lecture");
                return;
            }
            match ui.view_mode {
                ViewMode::Training => {
                    if !ui.selected_lectures.remove(&id) {
                        ui.selected_lectures.insert(id);
                    }
                    Some(ui.lecture_menu())
                }
                ViewMode::Dictionary => {
                    ui.lecture_for_view = Some(id);
                    None
                }
            }
        };
        match menu {
            Some(menu) => self.presenter.show_lectures(&menu),
            None => {
                self.navigate(screens::DICTIONARY_VIEW).await;
            }
        }
    }

    // ---------- training ----------

    #[instrument(level = "info", target = "training", skip(self))]
    async fn start_training(&self, direction: Direction) {
        let (mode, lectures, language) = {
            let ui = self.ui();
            let lectures = match ui.mode {
                TrainingMode::SpecificAll => ui.lectures.iter().copied().collect(),
                _ => ui.selected_lectures.clone(),
            };
            (ui.mode, lectures, ui.language)
        };
        let pool = self.training.build_word_pool(mode, &lectures, true).await;
        let plan = SessionPlan { mode, direction, language, selected_lectures: lectures };
        match self.training.start_session(pool, plan) {
            Ok(_) => {
                self.navigate(screens::TRAINING).await;
            }
            Err(TrainingError::NoWords) => self.presenter.notice(&Notice::NoWords),
        }
    }

    fn show_current_question(&self) -> QuestionState {
        let state = self.training.current_question();
        if let QuestionState::Ask(q) = &state {
            self.presenter.show_question(q);
        }
        state
    }

    /// Grades `input`, keeps the feedback up for the configured pause, then shows the
    /// next question or the results.
    #[instrument(level = "debug", target = "training", skip(self, input))]
    pub async fn submit_answer(&self, input: &str) -> Grade {
        let grade = self.training.grade_answer(input).await;
        match &grade {
            Grade::EmptyAnswer => self.presenter.notice(&Notice::Input(InputError::EmptyAnswer)),
            Grade::Graded(feedback) => {
                self.presenter.show_feedback(feedback);
                tokio::time::sleep(self.config.pacing.delay(feedback.is_correct)).await;
                self.advance().await;
            }
            Grade::Busy | Grade::NoQuestion => {
                debug!(target: "training", ?grade, "Answer not graded");
            }
        }
        grade
    }

    async fn advance(&self) {
        if !self.navigator.is_showing(screens::TRAINING) {
            debug!(target: "training", "Training screen left; not advancing");
            return;
        }
        if self.show_current_question() == QuestionState::Complete {
            self.navigate(screens::RESULTS).await;
        }
    }

    pub fn toggle_shift(&self) {
        let kb = {
            let mut kb = self.keyboard();
            kb.toggle_shift();
            *kb
        };
        self.presenter.show_keyboard(&kb);
    }

    /// Inserts the `key`-th letter of the on-screen keyboard at the end of `text`.
    pub fn type_special(&self, text: &str, key: usize) -> Option<String> {
        let ch = *self.keyboard().keys().get(key)?;
        let end = text.chars().count();
        Some(insert_char(text, end..end, ch).0)
    }

    // ---------- profile ----------

    fn profile_view(&self, user: &UserProfile, readonly: bool) -> ProfileView {
        ProfileView::build(user, &self.ranks, &self.ui().avatars, readonly)
    }

    fn refresh_profile(&self) {
        if !self.navigator.is_showing(screens::PROFILE) {
            return;
        }
        if let Some(user) = self.user.get() {
            self.presenter.show_profile(&self.profile_view(&user, false));
        }
    }

    #[instrument(level = "info", target = "slovicka", skip(self))]
    pub async fn view_user_profile(&self, username: &str) -> Result<(), ApiError> {
        if self.user.username().as_deref() == Some(username) {
            debug!(target: "slovicka", "Own leaderboard row is not clickable");
            return Ok(());
        }
        let profile = match self.backend.user_profile(username).await {
            Ok(p) => p,
            Err(e) => {
                self.presenter.notice(&failure_notice(&e));
                return Err(e);
            }
        };
        self.ui().viewing_user = Some(profile);
        self.navigate(screens::VIEW_PROFILE).await;
        Ok(())
    }

    async fn change_avatar(&self, step: isize) {
        let (viewing, avatars) = {
            let ui = self.ui();
            (ui.viewing_user.is_some(), ui.avatars.clone())
        };
        if viewing {
            return;
        }
        let Some(user) = self.user.get() else { return };
        let Some(gender) = user.gender else { return };
        let Some(next) = cycle_avatar(avatars.for_gender(gender), user.avatar.as_deref(), step) else {
            return;
        };
        self.user.update(|p| p.avatar = Some(next.clone()));
        self.refresh_profile();
        if let Err(e) = self.backend.save_avatar(None, Some(&next)).await {
            warn!(target: "slovicka", error = %e, "Saving avatar failed");
        }
    }

    /// Sets the gender and resets the avatar to that gender's first one (or none).
    #[instrument(level = "info", target = "slovicka", skip(self))]
    pub async fn change_gender(&self, gender: Gender) {
        let avatar = self.ui().avatars.for_gender(gender).first().cloned();
        let changed = self.user.update(|p| {
            p.gender = Some(gender);
            p.avatar = avatar.clone();
        });
        if changed.is_none() {
            return;
        }
        if let Err(e) = self.backend.save_avatar(Some(gender), avatar.as_deref()).await {
            warn!(target: "slovicka", error = %e, "Saving gender failed");
        }
        self.refresh_profile();
        if self.navigator.is_showing(screens::SETTINGS) {
            self.presenter.show_settings(Some(gender));
        }
    }

    /// Starts the effect of `egg`, or stops it when it is already playing. Newly found
    /// eggs are added to the profile and persisted.
    #[instrument(level = "info", target = "slovicka", skip(self))]
    pub async fn activate_egg(&self, egg: &str) -> Option<EggToggle> {
        if !is_known_egg(egg) {
            debug!(target: "slovicka", egg, "Unknown effect");
            return None;
        }
        let toggle = self.effects.toggle(egg);
        if toggle == EggToggle::Stopped {
            self.presenter.stop_effects();
            return Some(toggle);
        }
        self.presenter.start_effect(egg);

        let found = self
            .user
            .update(|p| p.found_easter_eggs.insert(egg.to_string()).then(|| p.found_easter_eggs.clone()))
            .flatten();
        if let Some(eggs) = found {
            info!(target: "slovicka", egg, total = eggs.len(), "Easter egg found");
            self.refresh_profile();
            if let Err(e) = self.backend.save_easter_eggs(&eggs).await {
                warn!(target: "slovicka", error = %e, "Saving easter eggs failed");
            }
        }
        Some(toggle)
    }

    // ---------- dictionary & search ----------

    pub async fn set_language(&self, language: Language) {
        let term = {
            let mut ui = self.ui();
            ui.language = language;
            ui.dictionary_term.clone()
        };
        self.training.set_language(language);
        self.filter_dictionary(&term);
    }

    fn render_dictionary(&self, lecture: u32, words: &[Word], term: &str, language: Language) {
        let notebook_egg_found = (lecture == NOTEBOOK_LECTURE).then(|| {
            self.user
                .get()
                .is_some_and(|u| u.found_easter_eggs.contains(NOTEBOOK_EGG))
        });
        self.presenter.show_dictionary(&DictionaryView {
            lecture,
            entries: filter_dictionary(words, lecture, term, language),
            notebook_egg_found,
        });
    }

    async fn load_dictionary(&self) {
        let (lecture, language) = {
            let mut ui = self.ui();
            ui.dictionary_term.clear();
            (ui.lecture_for_view, ui.language)
        };
        let Some(lecture) = lecture else {
            warn!(target: "slovicka", "Dictionary opened without a lecture");
            return;
        };
        let words = self
            .training
            .build_word_pool(TrainingMode::SpecificSelected, &BTreeSet::from([lecture]), false)
            .await;
        self.render_dictionary(lecture, &words, "", language);
    }

    /// Re-renders the open dictionary page filtered by `term`.
    pub fn filter_dictionary(&self, term: &str) {
        if !self.navigator.is_showing(screens::DICTIONARY_VIEW) {
            return;
        }
        let (lecture, language) = {
            let mut ui = self.ui();
            ui.dictionary_term = term.to_string();
            (ui.lecture_for_view, ui.language)
        };
        let Some(lecture) = lecture else { return };
        let words = self
            .cache
            .get(LectureKey::Lecture(lecture))
            .unwrap_or_default();
        self.render_dictionary(lecture, &words, term, language);
    }

    fn abort_search(&self) {
        let previous = self.search.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = previous {
            handle.abort();
            debug!(target: "slovicka", "Search request aborted");
        }
    }

    /// Searches every lecture. A newer search cancels the one in flight; an empty term
    /// clears the results.
    pub fn global_search(self: &Arc<Self>, term: &str) {
        self.abort_search();
        let term = term.trim().to_string();
        if term.is_empty() {
            self.presenter.show_search_results(&[]);
            return;
        }
        let app = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(app.config.pacing.search_debounce()).await;
            let language = app.language();
            match app.backend.global_search(&term).await {
                Ok(words) => app.presenter.show_search_results(&search_hits(&words, language)),
                Err(e) => {
                    warn!(target: "slovicka", error = %e, "Global search failed");
                    app.presenter.show_search_results(&[]);
                }
            }
        });
        *self.search.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Waits for the search in flight, if any.
    pub async fn settle_search(&self) {
        let handle = self.search.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                debug!(target: "slovicka", error = %e, "Search task ended early");
            }
        }
    }

    // ---------- screen setup ----------

    async fn run_setup(&self, setup: ScreenSetup) {
        match setup {
            ScreenSetup::MainMenu => {
                self.presenter.show_header(self.user.username().as_deref());
            }
            ScreenSetup::Profile => {
                let Some(user) = self.user.get() else { return };
                self.presenter.show_profile(&self.profile_view(&user, false));
                let rows = leaderboard_rows(&self.ui().leaderboard, &self.ranks, Some(&user.username));
                self.presenter.show_leaderboard(&rows);
            }
            ScreenSetup::Settings => {
                let gender = self.user.get().and_then(|u| u.gender);
                self.presenter.show_settings(gender);
            }
            ScreenSetup::LectureSelection => {
                let menu = {
                    let mut ui = self.ui();
                    ui.selected_lectures.clear();
                    ui.lecture_menu()
                };
                self.presenter.show_lectures(&menu);
                self.presenter.show_search_results(&[]);
            }
            ScreenSetup::DictionaryView => self.load_dictionary().await,
            ScreenSetup::Training => {
                if self.show_current_question() != QuestionState::Complete {
                    let kb = *self.keyboard();
                    self.presenter.show_keyboard(&kb);
                } else {
                    warn!(target: "training", "Training screen opened on a finished session");
                }
            }
            ScreenSetup::Results => {
                self.presenter.show_results(&ResultsView::from(self.training.summarize()));
                // XP changed; refresh the leaderboard.
                self.load_initial_data().await;
            }
            ScreenSetup::ViewProfile => {
                let viewing = self.ui().viewing_user.clone();
                match viewing {
                    Some(user) => self.presenter.show_profile(&self.profile_view(&user, true)),
                    None => warn!(target: "slovicka", "Profile viewer opened without a user"),
                }
            }
        }
    }
}

#[async_trait]
impl ScreenLifecycle for App {
    async fn screen_loaded(&self, screen: &ScreenId) {
        match self.setups.get(screen) {
            Some(setup) => self.run_setup(*setup).await,
            None => debug!(target: "navigation", %screen, "No setup for screen"),
        }
    }
}
