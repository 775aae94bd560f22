//! Screen navigation with animated transitions.
//!
//! One screen is displayed at a time. A navigation request removes the current screen
//! (exit animation), attaches the target screen's markup, fires the lifecycle hook and
//! plays the entry animation. While that runs the navigator is busy and every further
//! request is dropped, not queued.
//!
//! Completion is tracked with two flags, "old screen removed" and "new screen entered".
//! Each flips when its animation finishes, or immediately when there is nothing to
//! animate (no previous screen, missing template). Only when both are set does the
//! navigator accept requests again. The lifecycle hook runs alongside the entry
//! animation and does not hold the lock.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, error, info, instrument};

/// Names of the screens the application knows about.
pub mod screens {
    pub const WELCOME: &str = "welcome-screen";
    pub const LOGIN: &str = "login-screen";
    pub const REGISTER: &str = "register-screen";
    pub const MAIN_MENU: &str = "main-menu-screen";
    pub const PROFILE: &str = "profile-screen";
    pub const VIEW_PROFILE: &str = "view-profile-screen";
    pub const SETTINGS: &str = "settings-screen";
    pub const LECTURE_SELECTION: &str = "lecture-selection-screen";
    pub const DICTIONARY_VIEW: &str = "dictionary-view-screen";
    pub const DIRECTION_SELECTION: &str = "direction-selection-screen";
    pub const TRAINING: &str = "training-screen";
    pub const RESULTS: &str = "results-screen";
    pub const SPECIAL_EGG: &str = "macan-easter-egg-screen";

    pub const ALL: &[&str] = &[
        WELCOME,
        LOGIN,
        REGISTER,
        MAIN_MENU,
        PROFILE,
        VIEW_PROFILE,
        SETTINGS,
        LECTURE_SELECTION,
        DICTIONARY_VIEW,
        DIRECTION_SELECTION,
        TRAINING,
        RESULTS,
        SPECIAL_EGG,
    ];
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScreenId(String);

impl ScreenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScreenId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<&str> for ScreenId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Markup fragment of a screen template. Opaque to the navigator.
pub type Markup = String;

/// Source of screen templates.
pub trait TemplateRegistry: Send + Sync {
    fn template(&self, screen: &ScreenId) -> Option<Markup>;
}

impl TemplateRegistry for HashMap<ScreenId, Markup> {
    fn template(&self, screen: &ScreenId) -> Option<Markup> {
        self.get(screen).cloned()
    }
}

/// Presentation surface that screens are mounted on.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Plays the exit animation of `screen` and detaches it once finished.
    async fn exit(&self, screen: &ScreenId);
    /// Mounts `markup` as the displayed content of `screen`.
    fn attach(&self, screen: &ScreenId, markup: &Markup);
    /// Resolves when the entry animation of `screen` has finished.
    async fn enter(&self, screen: &ScreenId);
    /// Resets transient child visibility of `screen` (overlays, search results).
    fn restore_defaults(&self, _screen: &ScreenId) {}
}

/// Fired exactly once per navigation that attached markup.
#[async_trait]
pub trait ScreenLifecycle: Send + Sync {
    async fn screen_loaded(&self, screen: &ScreenId);
}

/// Result of a navigation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavOutcome {
    /// Another transition was running; nothing happened.
    Dropped,
    /// The target screen is displayed.
    Entered,
    /// No template for the target; the old screen was removed and navigation unlocked.
    MissingTemplate,
}

/// Releases the busy flag when dropped, so a cancelled transition cannot keep
/// navigation locked.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Navigator {
    stage: Arc<dyn Stage>,
    templates: Arc<dyn TemplateRegistry>,
    /// Screens whose transient children are reset when navigated away from.
    transient: HashSet<ScreenId>,
    busy: AtomicBool,
    current: Mutex<Option<ScreenId>>,
}

impl Navigator {
    pub fn new(stage: Arc<dyn Stage>, templates: Arc<dyn TemplateRegistry>) -> Self {
        Self {
            stage,
            templates,
            transient: HashSet::new(),
            busy: AtomicBool::new(false),
            current: Mutex::new(None),
        }
    }

    pub fn with_transient(mut self, screen: impl Into<ScreenId>) -> Self {
        self.transient.insert(screen.into());
        self
    }

    pub fn is_transitioning(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Currently displayed screen.
    pub fn current(&self) -> Option<ScreenId> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_showing(&self, screen: &str) -> bool {
        self.current().is_some_and(|s| s == screen)
    }

    #[instrument(level = "debug", target = "navigation", skip(self, lifecycle), fields(%screen))]
    pub async fn navigate_to(&self, screen: ScreenId, lifecycle: &dyn ScreenLifecycle) -> NavOutcome {
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!(target: "navigation", %screen, "Navigation blocked: transition already in progress");
            return NavOutcome::Dropped;
        }
        let guard = BusyGuard(&self.busy);
        info!(target: "navigation", %screen, "Starting navigation");

        let old = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(old) = old.as_ref().filter(|o| self.transient.contains(*o)) {
            self.stage.restore_defaults(old);
        }

        let template = self.templates.template(&screen);
        match &template {
            Some(markup) => {
                self.stage.attach(&screen, markup);
                *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(screen.clone());
            }
            None => error!(target: "navigation", %screen, "Template not found; unlocking navigation"),
        }

        let old_removed = async {
            if let Some(old) = &old {
                self.stage.exit(old).await;
                debug!(target: "navigation", %old, "Old screen removed");
            }
        };
        let new_entered = async {
            if template.is_some() {
                self.stage.enter(&screen).await;
                debug!(target: "navigation", %screen, "New screen entered");
            }
        };
        let transition = async move {
            tokio::join!(old_removed, new_entered);
            drop(guard);
        };

        if template.is_some() {
            tokio::join!(transition, lifecycle.screen_loaded(&screen));
            info!(target: "navigation", %screen, "Navigation finished");
            NavOutcome::Entered
        } else {
            transition.await;
            NavOutcome::MissingTemplate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingLifecycle, RecordingStage};

    fn navigator(stage: Arc<RecordingStage>) -> Navigator {
        let templates: HashMap<ScreenId, Markup> = ["a", "b", "search"]
            .into_iter()
            .map(|s| (ScreenId::from(s), format!("<{s}>")))
            .collect();
        Navigator::new(stage, Arc::new(templates)).with_transient("search")
    }

    #[tokio::test]
    async fn second_request_during_transition_is_dropped() {
        let stage = Arc::new(RecordingStage::with_delay_ms(10));
        let nav = navigator(stage.clone());
        let hooks = RecordingLifecycle::default();

        let (first, second) = tokio::join!(
            nav.navigate_to("a".into(), &hooks),
            nav.navigate_to("b".into(), &hooks),
        );
        assert_eq!(first, NavOutcome::Entered);
        assert_eq!(second, NavOutcome::Dropped);
        assert_eq!(nav.current(), Some(ScreenId::from("a")));
        assert_eq!(hooks.loaded(), vec![ScreenId::from("a")]);
        assert!(!nav.is_transitioning());
    }

    #[tokio::test]
    async fn missing_template_fails_open() {
        let stage = Arc::new(RecordingStage::with_delay_ms(1));
        let nav = navigator(stage.clone());
        let hooks = RecordingLifecycle::default();

        assert_eq!(nav.navigate_to("a".into(), &hooks).await, NavOutcome::Entered);
        assert_eq!(nav.navigate_to("nowhere".into(), &hooks).await, NavOutcome::MissingTemplate);
        assert!(!nav.is_transitioning());
        assert_eq!(nav.current(), None);
        assert_eq!(nav.navigate_to("b".into(), &hooks).await, NavOutcome::Entered);
        assert_eq!(hooks.loaded(), vec![ScreenId::from("a"), ScreenId::from("b")]);
    }

    #[tokio::test]
    async fn hook_fires_before_entry_animation_completes() {
        let stage = Arc::new(RecordingStage::with_delay_ms(5));
        let nav = navigator(stage.clone());
        let hooks = RecordingLifecycle::observing(stage.clone());

        nav.navigate_to("a".into(), &hooks).await;
        let events = stage.events();
        let attached = events.iter().position(|e| e == "attach a").unwrap();
        let entered = events.iter().position(|e| e == "entered a").unwrap();
        let hooked = events.iter().position(|e| e == "hook a").unwrap();
        assert!(attached < hooked);
        assert!(hooked < entered);
    }

    #[tokio::test]
    async fn transient_screen_is_restored_before_teardown() {
        let stage = Arc::new(RecordingStage::with_delay_ms(1));
        let nav = navigator(stage.clone());
        let hooks = RecordingLifecycle::default();

        nav.navigate_to("search".into(), &hooks).await;
        nav.navigate_to("a".into(), &hooks).await;
        nav.navigate_to("b".into(), &hooks).await;

        let events = stage.events();
        assert_eq!(events.iter().filter(|e| e.starts_with("restore")).count(), 1);
        let restore = events.iter().position(|e| e == "restore search").unwrap();
        let exit = events.iter().position(|e| e == "exited search").unwrap();
        assert!(restore < exit);
    }

    #[tokio::test]
    async fn unlocks_even_when_cancelled_mid_transition() {
        let stage = Arc::new(RecordingStage::with_delay_ms(50));
        let nav = navigator(stage.clone());
        let hooks = RecordingLifecycle::default();

        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(5),
            nav.navigate_to("a".into(), &hooks),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(!nav.is_transitioning());
        assert_eq!(nav.navigate_to("b".into(), &hooks).await, NavOutcome::Entered);
    }
}
