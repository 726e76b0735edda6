//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{rejection::JsonRejection, Path, State},
  http::{header, StatusCode},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::domain::PracticeMode;
use crate::error::PracticeError;
use crate::language::LANGUAGES;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, PracticeError>;

/// A body that may be left out entirely. A request without a JSON content type reads as the
/// default; a JSON body that does not parse is rejected.
fn optional_body<T: Default>(body: Result<Json<T>, JsonRejection>) -> Result<T, PracticeError> {
  match body {
    Ok(Json(b)) => Ok(b),
    Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
    Err(e) => Err(e.into()),
  }
}

fn require_mode(mode: PracticeMode, expected: PracticeMode) -> Result<(), PracticeError> {
  if mode == expected {
    Ok(())
  } else {
    Err(PracticeError::InvalidSelection(format!("only available in {} practice", expected)))
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, delegate: state.openai.is_some() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(LanguagesOut { languages: LANGUAGES, default: state.settings.default_language.clone() })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_create_session(
  State(state): State<Arc<AppState>>,
  body: Result<Json<CreateSessionIn>, JsonRejection>,
) -> ApiResult<SessionOut> {
  let body = optional_body(body)?;
  let out = logic::create_session(&state, body.language.as_deref()).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<SessionOut> {
  Ok(Json(logic::snapshot(&state, &id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_end_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, PracticeError> {
  logic::end_session(&state, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, body), fields(language = %body.language))]
pub async fn http_set_language(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<LanguageIn>,
) -> ApiResult<SessionOut> {
  Ok(Json(logic::set_language(&state, &id, &body.language).await?))
}

#[instrument(level = "info", skip(state, body), fields(exercise = ?body.exercise, method = ?body.method))]
pub async fn http_configure(
  State(state): State<Arc<AppState>>,
  Path((id, mode)): Path<(String, PracticeMode)>,
  Json(body): Json<ConfigureIn>,
) -> ApiResult<RoundOut> {
  let method = body.method.unwrap_or_default();
  Ok(Json(logic::configure(&state, &id, mode, body.exercise, method).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_generate(
  State(state): State<Arc<AppState>>,
  Path((id, mode)): Path<(String, PracticeMode)>,
  body: Result<Json<GenerateIn>, JsonRejection>,
) -> ApiResult<GenerateOut> {
  let body = optional_body(body)?;
  let out = logic::generate(&state, &id, mode, body.keywords.as_deref(), body.upload.as_ref()).await?;
  info!(target: "practice", %id, %mode, questions = out.round.questions.len(), warnings = out.files.warnings.len(), "HTTP generate served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(index = body.index))]
pub async fn http_answer(
  State(state): State<Arc<AppState>>,
  Path((id, mode)): Path<(String, PracticeMode)>,
  Json(body): Json<AnswerIn>,
) -> ApiResult<RoundOut> {
  Ok(Json(logic::answer(&state, &id, mode, body.index, &body.letter).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_submit(
  State(state): State<Arc<AppState>>,
  Path((id, mode)): Path<(String, PracticeMode)>,
) -> ApiResult<SubmitOut> {
  let out = logic::submit(&state, &id, mode).await?;
  info!(target: "practice", %id, %mode, score = out.score.score, "HTTP submit evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_analyze(
  State(state): State<Arc<AppState>>,
  Path((id, mode)): Path<(String, PracticeMode)>,
  Json(body): Json<TextIn>,
) -> ApiResult<AnalysisOut> {
  Ok(Json(logic::analyze(&state, &id, mode, &body.text).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset(
  State(state): State<Arc<AppState>>,
  Path((id, mode)): Path<(String, PracticeMode)>,
) -> ApiResult<RoundOut> {
  Ok(Json(logic::new_test(&state, &id, mode).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_audio(
  State(state): State<Arc<AppState>>,
  Path((id, mode)): Path<(String, PracticeMode)>,
) -> Result<impl IntoResponse, PracticeError> {
  require_mode(mode, PracticeMode::Listening)?;
  let wav = logic::listening_audio(&state, &id).await?;
  Ok(([(header::CONTENT_TYPE, "audio/wav")], wav))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_record(
  State(state): State<Arc<AppState>>,
  Path((id, mode)): Path<(String, PracticeMode)>,
  body: Result<Json<RecordIn>, JsonRejection>,
) -> ApiResult<RecordingOut> {
  require_mode(mode, PracticeMode::Speaking)?;
  let Json(body) = body?;
  info!(target: "practice", %id, title = %body.title, audio_len = body.audio_base64.len(), "HTTP recording received");
  Ok(Json(logic::speak(&state, &id, &body.title, &body.audio_base64).await?))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_chat(
  State(state): State<Arc<AppState>>,
  Path((id, mode)): Path<(String, PracticeMode)>,
  Json(body): Json<TextIn>,
) -> ApiResult<ChatOut> {
  require_mode(mode, PracticeMode::Listening)?;
  Ok(Json(logic::converse(&state, &id, &body.text).await?))
}
