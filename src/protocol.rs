//! Request/response bodies of the remote API (serde ready).
//! Keep this small and stable so the client and the server can evolve independently.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Gender, LeaderboardEntry, LectureKey, UserProfile};

#[derive(Debug, Serialize)]
pub struct WordsIn<'a> {
    pub lectures: &'a [LectureKey],
}

#[derive(Debug, Serialize)]
pub struct XpIn {
    pub xp: u32,
}

#[derive(Serialize)]
pub struct CredentialsIn<'a> {
    pub username: &'a str,
    pub pin: &'a str,
}

/// `{ "user": ... }` wrapper used by session/login/register.
#[derive(Debug, Deserialize)]
pub struct UserEnvelope {
    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AvatarLists {
    #[serde(rename = "M", default)]
    pub male: Vec<String>,
    #[serde(rename = "F", default)]
    pub female: Vec<String>,
}

impl AvatarLists {
    pub fn for_gender(&self, gender: Gender) -> &[String] {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
            Gender::Unspecified => &[],
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InitialData {
    #[serde(default)]
    pub lectures: Vec<u32>,
    #[serde(default)]
    pub leaderboard: Vec<LeaderboardEntry>,
    #[serde(default)]
    pub avatars: AvatarLists,
}

#[derive(Serialize)]
pub struct ChangePinIn<'a> {
    pub new_pin: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SaveAvatarIn<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    pub avatar: Option<&'a str>,
}

#[derive(Serialize)]
pub struct SaveEggsIn<'a> {
    pub eggs: &'a BTreeSet<String>,
}

#[derive(Serialize)]
pub struct SearchIn<'a> {
    pub term: &'a str,
}

/// Error bodies: `{"message": ...}`, `{"error": ...}` or `{"description": ...}`.
#[derive(Deserialize)]
pub struct ErrorOut {
    #[serde(alias = "error", alias = "description")]
    pub message: String,
}
