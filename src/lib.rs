//! Slovíčka · Czech vocabulary trainer client core.
//!
//! - `navigation`: single-flight screen transitions with a post-attach lifecycle hook
//! - `training`: word pools, shuffled sessions, grading and XP
//! - `app`: session-scoped context tying both to the remote API and a front end

pub mod actions;
pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod dictionary;
pub mod domain;
pub mod error;
pub mod grading;
pub mod keyboard;
pub mod level;
pub mod navigation;
pub mod presenter;
pub mod profile;
pub mod protocol;
pub mod telemetry;
pub mod training;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;
