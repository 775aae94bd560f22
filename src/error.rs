//! Error types shared across the client core.

use thiserror::Error;

/// Failures talking to the remote API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
  #[error("invalid API base URL: {0}")]
  InvalidBaseUrl(String),
  #[error("request failed with status {status}: {message}")]
  Status {
    status: reqwest::StatusCode,
    message: String,
  },
  #[error(transparent)]
  Http(#[from] reqwest::Error),
}

impl ApiError {
  pub fn status(&self) -> Option<reqwest::StatusCode> {
    match self {
      ApiError::Status { status, .. } => Some(*status),
      ApiError::Http(e) => e.status(),
      ApiError::InvalidBaseUrl(_) => None,
    }
  }
}

/// Input the user has to correct before anything happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
  #[error("the answer field cannot be empty")]
  EmptyAnswer,
  #[error("username must be 3 to 24 characters long")]
  InvalidUsername,
  #[error("PIN must consist of exactly 4 digits")]
  InvalidPin,
  #[error("select at least one lecture")]
  NoLectureSelected,
}

/// Failures building a training session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrainingError {
  #[error("no words available for this mode")]
  NoWords,
}

/// Failures loading the client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error(transparent)]
  Parse(#[from] toml::de::Error),
  #[error("invalid rank table: {0}")]
  InvalidRanks(String),
}

/// Failures of the account operations (login, registration, PIN change).
#[derive(Debug, Error)]
pub enum AccountError {
  #[error(transparent)]
  Input(#[from] InputError),
  #[error(transparent)]
  Api(#[from] ApiError),
}

/// Action names or arguments that do not map onto a known action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
  #[error("unknown action '{0}'")]
  Unknown(String),
  #[error("action '{0}' needs an argument")]
  MissingArgument(&'static str),
  #[error("invalid argument '{value}' for action '{action}'")]
  InvalidArgument { action: &'static str, value: String },
}
