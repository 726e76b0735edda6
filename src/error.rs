//! Error type returned by practice operations, with its HTTP mapping.

use std::fmt;

use axum::{
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;

use crate::audio::AudioError;
use crate::session::SessionError;

#[derive(Debug)]
pub enum PracticeError {
  UnknownSession(String),
  /// A required input was absent or blank (named by the payload).
  MissingInput(&'static str),
  InvalidSelection(String),
  Session(SessionError),
  Audio(AudioError),
  Upstream(String),
  /// The request body could not be read as the expected JSON.
  InvalidBody { status: StatusCode, message: String },
}

impl PracticeError {
  /// Short machine-readable kind for the JSON body.
  pub fn kind(&self) -> &'static str {
    match self {
      PracticeError::UnknownSession(_) => "unknown_session",
      PracticeError::MissingInput(_) => "missing_input",
      PracticeError::InvalidSelection(_) => "invalid_selection",
      PracticeError::Session(SessionError::NoUsableContent { .. }) => "no_usable_content",
      PracticeError::Session(_) => "invalid_state",
      PracticeError::Audio(_) => "invalid_audio",
      PracticeError::Upstream(_) => "upstream",
      PracticeError::InvalidBody { .. } => "invalid_body",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      PracticeError::UnknownSession(_) => StatusCode::NOT_FOUND,
      PracticeError::MissingInput(_) | PracticeError::InvalidSelection(_) | PracticeError::Audio(_) => {
        StatusCode::BAD_REQUEST
      }
      PracticeError::Session(SessionError::NoUsableContent { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
      PracticeError::Session(_) => StatusCode::CONFLICT,
      PracticeError::Upstream(_) => StatusCode::BAD_GATEWAY,
      PracticeError::InvalidBody { status, .. } => *status,
    }
  }
}

impl fmt::Display for PracticeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PracticeError::UnknownSession(id) => write!(f, "Unknown session: {}", id),
      PracticeError::MissingInput(what) => write!(f, "Missing input: {}", what),
      PracticeError::InvalidSelection(msg) => write!(f, "Invalid selection: {}", msg),
      PracticeError::Session(e) => write!(f, "{}", e),
      PracticeError::Audio(e) => write!(f, "{}", e),
      PracticeError::Upstream(msg) => write!(f, "Upstream service failed: {}", msg),
      PracticeError::InvalidBody { message, .. } => write!(f, "Invalid request body: {}", message),
    }
  }
}

impl std::error::Error for PracticeError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      PracticeError::Session(e) => Some(e),
      PracticeError::Audio(e) => Some(e),
      _ => None,
    }
  }
}

impl From<SessionError> for PracticeError {
  fn from(err: SessionError) -> Self {
    PracticeError::Session(err)
  }
}

impl From<AudioError> for PracticeError {
  fn from(err: AudioError) -> Self {
    PracticeError::Audio(err)
  }
}

impl From<JsonRejection> for PracticeError {
  fn from(rejection: JsonRejection) -> Self {
    PracticeError::InvalidBody { status: rejection.status(), message: rejection.body_text() }
  }
}

impl IntoResponse for PracticeError {
  fn into_response(self) -> Response {
    let body = json!({ "error": self.kind(), "message": self.to_string() });
    (self.status(), Json(body)).into_response()
  }
}
