//! Core practice operations shared by both HTTP and WebSocket handlers.
//!
//! Every operation follows the same shape: read what it needs from the session under a short lock,
//! release it, talk to the OpenAI client (or the offline fallbacks), then re-lock and apply the
//! result through the round state machine, which rejects anything produced for an older epoch.
//! Artifacts are persisted as they are produced; write failures come back as warnings.

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::audio::{decode_wav_base64, pcm_to_wav, TTS_SAMPLE_RATE};
use crate::config::{PromptRequest, CONVERSATION};
use crate::domain::{Artifact, ArtifactOrigin, ChatTurn, Exercise, GenerationMethod, PracticeMode};
use crate::error::PracticeError;
use crate::language;
use crate::parser::{parse_questions, ParseOutcome, QuestionTemplate};
use crate::protocol::{
  round_out, session_out, AnalysisOut, ChatOut, GenerateOut, RecordingOut, RoundOut, SavedFiles, SessionOut,
  SubmitOut, UploadIn,
};
use crate::seeds;
use crate::session::{Session, SessionError};
use crate::state::AppState;
use crate::util::preview;

/// Layout the question generator is asked for in each quiz mode.
pub fn question_template(mode: PracticeMode) -> QuestionTemplate {
  match mode {
    PracticeMode::Reading => QuestionTemplate::Numbered,
    _ => QuestionTemplate::Labeled,
  }
}

fn resolve_language(name: &str) -> Result<String, PracticeError> {
  let name = name.trim();
  if name.is_empty() {
    return Err(PracticeError::MissingInput("language"));
  }
  language::find(name)
    .map(|l| l.name.to_string())
    .ok_or_else(|| PracticeError::InvalidSelection(format!("unknown language '{}'", name)))
}

fn no_prompt(exercise: Exercise) -> PracticeError {
  PracticeError::InvalidSelection(format!("{:?} has no prompt in this mode", exercise))
}

fn non_blank(s: Option<&str>) -> Option<&str> {
  s.map(str::trim).filter(|s| !s.is_empty())
}

/// Strong-model completion, or the given fallback when no API key is configured.
async fn complete_or(state: &AppState, req: &PromptRequest, offline: impl FnOnce() -> String) -> Result<String, PracticeError> {
  match &state.openai {
    Some(oa) => {
      let text = oa.complete(req).await.map_err(PracticeError::Upstream)?;
      if text.is_empty() {
        return Err(PracticeError::Upstream("empty completion".into()));
      }
      Ok(text)
    }
    None => Ok(offline()),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn create_session(state: &AppState, language: Option<&str>) -> Result<SessionOut, PracticeError> {
  let language = match non_blank(language) {
    Some(l) => resolve_language(l)?,
    None => state.settings.default_language.clone(),
  };
  let session = Session::new(Uuid::new_v4().to_string(), language);
  let out = session_out(&session);
  state.insert_session(session).await;
  info!(target: "practice", id = %out.id, language = %out.language, "Session created");
  Ok(out)
}

/// Drop a session and everything it holds. Saved files stay on disk.
#[instrument(level = "info", skip(state))]
pub async fn end_session(state: &AppState, session_id: &str) -> Result<(), PracticeError> {
  let session = state.remove_session(session_id).await?;
  info!(target: "practice", id = %session.id(), language = %session.language(), "Session ended");
  Ok(())
}

#[instrument(level = "debug", skip(state))]
pub async fn snapshot(state: &AppState, session_id: &str) -> Result<SessionOut, PracticeError> {
  state.read_session(session_id, session_out).await
}

#[instrument(level = "info", skip(state))]
pub async fn set_language(state: &AppState, session_id: &str, language: &str) -> Result<SessionOut, PracticeError> {
  let language = resolve_language(language)?;
  state
    .update_session(session_id, |s| {
      if s.set_language(&language) {
        info!(target: "practice", %session_id, %language, "Language changed; all rounds reset");
      }
      session_out(s)
    })
    .await
}

#[instrument(level = "info", skip(state))]
pub async fn configure(
  state: &AppState,
  session_id: &str,
  mode: PracticeMode,
  exercise: Exercise,
  method: GenerationMethod,
) -> Result<RoundOut, PracticeError> {
  if !mode.offers(exercise) {
    return Err(PracticeError::InvalidSelection(format!("{:?} is not offered in {} practice", exercise, mode)));
  }
  state
    .update_session(session_id, |s| {
      let round = s.round_mut(mode);
      if round.select(exercise, method) {
        debug!(target: "practice", %mode, ?exercise, ?method, epoch = round.epoch(), "Round reset for new selection");
      }
      round_out(mode, round)
    })
    .await
}

/// Produce the source artifact of a round (passage or writing prompt) and, for quizzes, its questions.
#[instrument(level = "info", skip(state, keywords, upload), fields(has_keywords = keywords.is_some(), has_upload = upload.is_some()))]
pub async fn generate(
  state: &AppState,
  session_id: &str,
  mode: PracticeMode,
  keywords: Option<&str>,
  upload: Option<&UploadIn>,
) -> Result<GenerateOut, PracticeError> {
  let (language, exercise, method, epoch) = state
    .read_session(session_id, |s| {
      let round = s.round(mode);
      round.begin_generation().map(|epoch| {
        (s.language().to_string(), round.exercise(), round.method().unwrap_or_default(), epoch)
      })
    })
    .await??;
  let exercise = exercise.ok_or(SessionError::NotConfigured)?;
  if !exercise.needs_artifact() {
    return Err(PracticeError::InvalidSelection(format!("{:?} has no source text to generate", exercise)));
  }

  let keywords = non_blank(keywords);
  let upload = upload.filter(|u| !u.text.trim().is_empty());
  match method {
    GenerationMethod::Keywords if keywords.is_none() => return Err(PracticeError::MissingInput("keywords")),
    GenerationMethod::Upload if upload.is_none() => return Err(PracticeError::MissingInput("upload")),
    _ => {}
  }

  let mut files = SavedFiles::default();
  let (text, origin, source_name) = match (method, upload) {
    (GenerationMethod::Upload, Some(up)) => {
      files.record(
        "uploaded text",
        state.store.save_text(mode, "uploaded_text", &up.text, Some(up.filename.as_str())).await,
      );
      if mode == PracticeMode::Reading {
        // The upload seeds a generated passage.
        let req = state.prompts.source(mode, &language, Some(up.text.as_str())).ok_or_else(|| no_prompt(exercise))?;
        let text = complete_or(state, &req, || seeds::offline_source(mode, Some(up.text.as_str()))).await?;
        files.record("passage", state.store.save_text(mode, "generated_text", &text, None).await);
        (text, ArtifactOrigin::Generated, Some(up.filename.clone()))
      } else {
        (up.text.clone(), ArtifactOrigin::Uploaded, Some(up.filename.clone()))
      }
    }
    _ => {
      let seed = if method == GenerationMethod::Keywords { keywords } else { None };
      let req = state.prompts.source(mode, &language, seed).ok_or_else(|| no_prompt(exercise))?;
      let text = complete_or(state, &req, || seeds::offline_source(mode, seed)).await?;
      let category = match mode {
        PracticeMode::Listening => "listening_text",
        PracticeMode::Writing => "prompt",
        _ => "generated_text",
      };
      files.record("source text", state.store.save_text(mode, category, &text, None).await);
      (text, ArtifactOrigin::Generated, None)
    }
  };
  info!(target: "practice", %mode, ?origin, text = %preview(&text, 60), "Source text ready");

  let audio_path = if mode == PracticeMode::Listening {
    synthesize(state, &text, &mut files).await
  } else {
    None
  };

  let (raw_questions, parsed) = if exercise.is_quiz() {
    let template = question_template(mode);
    let req = state.prompts.questions(template, &language, &text);
    let raw = complete_or(state, &req, || seeds::offline_questions(template).to_string()).await?;
    files.record("questions", state.store.save_text(mode, "generated_questions", &raw, None).await);
    let parsed = parse_questions(&raw, template);
    if let ParseOutcome::Parsed { skipped, .. } = &parsed {
      if *skipped > 0 {
        let total = skipped + parsed.questions().len();
        files.warn(format!("{} of {} generated questions were malformed and left out", skipped, total));
      }
    }
    (Some(raw), Some(parsed))
  } else {
    (None, None)
  };

  let artifact = Artifact { text, origin, source_name, audio_path };
  let round = state
    .update_session(session_id, |s| {
      let round = s.round_mut(mode);
      round.install_artifact(epoch, artifact, raw_questions, parsed).map(|count| {
        info!(target: "practice", %mode, questions = count, "Artifact installed");
        round_out(mode, round)
      })
    })
    .await?;
  match round {
    Ok(round) => Ok(GenerateOut { round, files }),
    Err(e) => {
      warn!(target: "practice", %mode, error = %e, saved = files.saved.len(), "Generated content not installed");
      Err(e.into())
    }
  }
}

/// Speech for a listening passage. Any failure leaves the round without audio.
async fn synthesize(state: &AppState, text: &str, files: &mut SavedFiles) -> Option<std::path::PathBuf> {
  let Some(oa) = &state.openai else {
    files.warn("Speech synthesis is unavailable without OPENAI_API_KEY");
    return None;
  };
  let pcm = match oa.synthesize_speech(text).await {
    Ok(pcm) => pcm,
    Err(e) => {
      error!(target: "practice", error = %e, "Speech synthesis failed; continuing without audio");
      files.warn(format!("Speech synthesis failed: {}", e));
      return None;
    }
  };
  match pcm_to_wav(&pcm, TTS_SAMPLE_RATE) {
    Ok(wav) => files.record("listening audio", state.store.save_audio(PracticeMode::Listening, "listening", &wav).await),
    Err(e) => {
      warn!(target: "practice", error = %e, "Synthesized audio unusable");
      files.warn(format!("Synthesized audio unusable: {}", e));
      None
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn answer(
  state: &AppState,
  session_id: &str,
  mode: PracticeMode,
  index: usize,
  letter: &str,
) -> Result<RoundOut, PracticeError> {
  state
    .update_session(session_id, |s| -> Result<RoundOut, PracticeError> {
      let round = s.round_mut(mode);
      round.record_answer(index, letter)?;
      Ok(round_out(mode, round))
    })
    .await?
}

/// Final submission: tally locally, then ask the grader for feedback on the tally.
#[instrument(level = "info", skip(state))]
pub async fn submit(state: &AppState, session_id: &str, mode: PracticeMode) -> Result<SubmitOut, PracticeError> {
  let (language, epoch, card, report, answers) = state
    .update_session(session_id, |s| {
      let language = s.language().to_string();
      let round = s.round_mut(mode);
      round.submit().map(|card| {
        let report = card.report(round.questions());
        (language, round.epoch(), card, report, round.answers().clone())
      })
    })
    .await??;
  info!(target: "practice", %mode, score = card.score, max = card.max_score, "Quiz scored");

  let mut files = SavedFiles::default();
  files.record("answers", state.store.save_answers(mode, &answers).await);

  let req = state.prompts.grading(&language, &state.settings.feedback_language, &report);
  let feedback = match complete_or(state, &req, || seeds::offline_quiz_feedback(&report)).await {
    Ok(f) => f,
    Err(e) => {
      // The score stands; only the commentary is lost.
      error!(target: "practice", error = %e, "Grading failed; returning the local tally");
      files.warn(format!("Grading failed: {}", e));
      seeds::offline_quiz_feedback(&report)
    }
  };
  files.record("analysis", state.store.save_text(mode, "analysis", &feedback, None).await);

  attach(state, session_id, mode, epoch, &feedback).await?;
  Ok(SubmitOut { score: card, report, feedback, files })
}

async fn attach(state: &AppState, session_id: &str, mode: PracticeMode, epoch: u64, feedback: &str) -> Result<(), PracticeError> {
  let res = state
    .update_session(session_id, |s| s.round_mut(mode).attach_feedback(epoch, feedback.to_string()))
    .await?;
  if let Err(e) = res {
    warn!(target: "practice", %mode, error = %e, "Feedback dropped");
  }
  Ok(())
}

/// Free-text analysis: dictation, reading short answers, writing compositions.
#[instrument(level = "info", skip(state, text), fields(text_len = text.len()))]
pub async fn analyze(state: &AppState, session_id: &str, mode: PracticeMode, text: &str) -> Result<AnalysisOut, PracticeError> {
  let text = non_blank(Some(text)).ok_or(PracticeError::MissingInput("text"))?;
  let (language, exercise, epoch, reference) = state
    .read_session(session_id, |s| {
      let round = s.round(mode);
      round.analysis_context().map(|(epoch, artifact)| {
        (s.language().to_string(), round.exercise(), epoch, artifact.map(|a| a.text.clone()))
      })
    })
    .await??;
  let exercise = exercise.ok_or(SessionError::NotConfigured)?;
  if !matches!(exercise, Exercise::Dictation | Exercise::ShortAnswer | Exercise::Composition) {
    return Err(PracticeError::InvalidSelection(format!("{:?} is not analyzed as free text", exercise)));
  }
  let reference = reference.unwrap_or_default();

  let mut files = SavedFiles::default();
  files.record("your text", state.store.save_text(mode, "user_input", text, None).await);

  let req = state
    .prompts
    .analysis(exercise, &language, &state.settings.feedback_language, &reference, text)
    .ok_or_else(|| no_prompt(exercise))?;
  let feedback = complete_or(state, &req, || seeds::offline_analysis(Some(reference.as_str()), text)).await?;
  files.record("analysis", state.store.save_text(mode, "analysis", &feedback, None).await);

  attach(state, session_id, mode, epoch, &feedback).await?;
  Ok(AnalysisOut { feedback, files })
}

/// Speaking: keep the recording, transcribe it in the session language, grade the transcript.
#[instrument(level = "info", skip(state, audio_base64), fields(audio_len = audio_base64.len()))]
pub async fn speak(state: &AppState, session_id: &str, title: &str, audio_base64: &str) -> Result<RecordingOut, PracticeError> {
  let mode = PracticeMode::Speaking;
  let title = non_blank(Some(title)).ok_or(PracticeError::MissingInput("title"))?;
  if audio_base64.trim().is_empty() {
    return Err(PracticeError::MissingInput("audio"));
  }
  let wav = decode_wav_base64(audio_base64)?;

  let (language, epoch) = state
    .update_session(session_id, |s| {
      let language = s.language().to_string();
      let round = s.round_mut(mode);
      if round.exercise().is_none() {
        round.select(Exercise::Recording, GenerationMethod::Random);
      }
      round.analysis_context().map(|(epoch, _)| (language, epoch))
    })
    .await??;

  let mut files = SavedFiles::default();
  let file_name = files
    .record("recording", state.store.save_audio(mode, title, &wav).await)
    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    .unwrap_or_else(|| "recording.wav".into());

  let oa = state
    .openai
    .as_ref()
    .ok_or_else(|| PracticeError::Upstream("speech-to-text needs OPENAI_API_KEY".into()))?;
  let code = language::speech_code(&language);
  let transcript = oa.transcribe(wav, &file_name, code).await.map_err(PracticeError::Upstream)?;
  if transcript.trim().is_empty() {
    return Err(PracticeError::MissingInput("speech (transcription was empty)"));
  }
  debug!(target: "practice", %code, transcript = %preview(&transcript, 60), "Recording transcribed");
  files.record("transcript", state.store.save_text(mode, "user_input", &transcript, Some(title)).await);

  let req = state
    .prompts
    .analysis(Exercise::Recording, &language, &state.settings.feedback_language, title, &transcript)
    .ok_or_else(|| no_prompt(Exercise::Recording))?;
  let feedback = complete_or(state, &req, || seeds::offline_analysis(None, &transcript)).await?;
  files.record(
    "analysis",
    state.store.save_text(mode, &format!("analysis_{}", title), &feedback, None).await,
  );

  attach(state, session_id, mode, epoch, &feedback).await?;
  Ok(RecordingOut { transcript, feedback, files })
}

/// One turn of the listening conversation.
#[instrument(level = "info", skip(state, text), fields(text_len = text.len()))]
pub async fn converse(state: &AppState, session_id: &str, text: &str) -> Result<ChatOut, PracticeError> {
  let mode = PracticeMode::Listening;
  let text = non_blank(Some(text)).ok_or(PracticeError::MissingInput("text"))?;
  let (language, epoch, mut history) = state
    .read_session(session_id, |s| {
      let round = s.round(mode);
      (s.language().to_string(), round.exercise(), round.epoch(), round.conversation().to_vec())
    })
    .await
    .and_then(|(language, exercise, epoch, history)| match exercise {
      Some(Exercise::Conversation) => Ok((language, epoch, history)),
      _ => Err(PracticeError::InvalidSelection("choose the conversation exercise first".into())),
    })?;
  history.push(ChatTurn::user(text));

  let reply = match &state.openai {
    Some(oa) => {
      let system = state.prompts.conversation(&language);
      oa.converse(&system, &history, CONVERSATION).await.map_err(PracticeError::Upstream)?
    }
    None => seeds::offline_conversation_reply(),
  };

  state
    .update_session(session_id, |s| {
      let round = s.round_mut(mode);
      if round.epoch() != epoch {
        return Err(SessionError::Stale);
      }
      round.push_turn(ChatTurn::user(text));
      round.push_turn(ChatTurn::assistant(reply.clone()));
      Ok(ChatOut { reply: reply.clone(), conversation: round.conversation().to_vec() })
    })
    .await?
    .map_err(Into::into)
}

#[instrument(level = "info", skip(state))]
pub async fn new_test(state: &AppState, session_id: &str, mode: PracticeMode) -> Result<RoundOut, PracticeError> {
  state
    .update_session(session_id, |s| {
      let round = s.round_mut(mode);
      round.new_test();
      round_out(mode, round)
    })
    .await
}

/// WAV bytes of the current listening passage.
#[instrument(level = "debug", skip(state))]
pub async fn listening_audio(state: &AppState, session_id: &str) -> Result<Vec<u8>, PracticeError> {
  let path = state
    .read_session(session_id, |s| s.round(PracticeMode::Listening).artifact().and_then(|a| a.audio_path.clone()))
    .await?
    .ok_or(PracticeError::MissingInput("listening audio"))?;
  tokio::fs::read(&path).await.map_err(|e| {
    error!(target: "practice", path = %path.display(), error = %e, "Listening audio unreadable");
    PracticeError::MissingInput("listening audio")
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{PracticeSettings, Prompts};
  use crate::session::QuizPhase;
  use crate::storage::ArtifactStore;

  fn offline_state() -> (AppState, std::path::PathBuf) {
    let root = std::env::temp_dir().join(format!("leaf-logic-{}", Uuid::new_v4()));
    let state = AppState::with_parts(None, Prompts::default(), PracticeSettings::default(), ArtifactStore::new(&root));
    (state, root)
  }

  #[tokio::test]
  async fn reading_quiz_runs_offline_end_to_end() {
    let (state, root) = offline_state();
    let s = create_session(&state, Some("german")).await.unwrap();
    assert_eq!(s.language, "German");

    configure(&state, &s.id, PracticeMode::Reading, Exercise::MultipleChoice, GenerationMethod::Random).await.unwrap();
    let gen = generate(&state, &s.id, PracticeMode::Reading, None, None).await.unwrap();
    assert_eq!(gen.round.questions.len(), 5);
    assert_eq!(gen.round.phase, QuizPhase::ArtifactReady);
    assert!(gen.files.warnings.is_empty());
    assert_eq!(gen.files.saved.len(), 2);

    for (i, l) in ["b", "c", "a", "a", "a"].iter().enumerate() {
      answer(&state, &s.id, PracticeMode::Reading, i + 1, l).await.unwrap();
    }
    let out = submit(&state, &s.id, PracticeMode::Reading).await.unwrap();
    assert_eq!(out.score.score, 80);
    assert!(out.feedback.starts_with("(local)"));
    assert!(out.report.ends_with("Total Score: 80/100"));

    let snap = snapshot(&state, &s.id).await.unwrap();
    let reading = snap.rounds.iter().find(|r| r.mode == PracticeMode::Reading).unwrap();
    assert_eq!(reading.phase, QuizPhase::Scored);
    assert_eq!(reading.feedback.as_deref(), Some(out.feedback.as_str()));

    let _ = tokio::fs::remove_dir_all(&root).await;
  }

  #[tokio::test]
  async fn keyword_and_upload_methods_need_their_input() {
    let (state, root) = offline_state();
    let s = create_session(&state, None).await.unwrap();
    configure(&state, &s.id, PracticeMode::Writing, Exercise::Composition, GenerationMethod::Keywords).await.unwrap();
    let err = generate(&state, &s.id, PracticeMode::Writing, Some("  "), None).await.unwrap_err();
    assert!(matches!(err, PracticeError::MissingInput("keywords")));

    configure(&state, &s.id, PracticeMode::Writing, Exercise::Composition, GenerationMethod::Upload).await.unwrap();
    let err = generate(&state, &s.id, PracticeMode::Writing, None, None).await.unwrap_err();
    assert!(matches!(err, PracticeError::MissingInput("upload")));

    let up = UploadIn { filename: "topic.txt".into(), text: "Write about rain.".into() };
    let gen = generate(&state, &s.id, PracticeMode::Writing, None, Some(&up)).await.unwrap();
    let artifact = gen.round.artifact.unwrap();
    assert_eq!(artifact.text, "Write about rain.");
    assert_eq!(artifact.origin, ArtifactOrigin::Uploaded);
    assert!(gen.files.saved[0].contains("uploaded_text_"));

    let _ = tokio::fs::remove_dir_all(&root).await;
  }

  #[tokio::test]
  async fn listening_offline_warns_about_missing_audio() {
    let (state, root) = offline_state();
    let s = create_session(&state, None).await.unwrap();
    configure(&state, &s.id, PracticeMode::Listening, Exercise::Dictation, GenerationMethod::Random).await.unwrap();
    let gen = generate(&state, &s.id, PracticeMode::Listening, None, None).await.unwrap();
    assert!(gen.round.questions.is_empty());
    assert!(gen.files.warnings.iter().any(|w| w.contains("Speech synthesis")));
    assert!(matches!(
      listening_audio(&state, &s.id).await,
      Err(PracticeError::MissingInput("listening audio"))
    ));

    let out = analyze(&state, &s.id, PracticeMode::Listening, seeds::OFFLINE_PASSAGE).await.unwrap();
    assert!(out.feedback.starts_with("(local) score=100/100"));

    let _ = tokio::fs::remove_dir_all(&root).await;
  }

  #[tokio::test]
  async fn selections_are_validated() {
    let (state, _root) = offline_state();
    let s = create_session(&state, None).await.unwrap();
    let err = configure(&state, &s.id, PracticeMode::Writing, Exercise::Dictation, GenerationMethod::Random).await.unwrap_err();
    assert!(matches!(err, PracticeError::InvalidSelection(_)));
    assert!(matches!(create_session(&state, Some("Klingon")).await, Err(PracticeError::InvalidSelection(_))));
    assert!(matches!(
      generate(&state, &s.id, PracticeMode::Reading, None, None).await,
      Err(PracticeError::Session(SessionError::NotConfigured))
    ));
    assert!(matches!(
      answer(&state, "missing", PracticeMode::Reading, 1, "A").await,
      Err(PracticeError::UnknownSession(_))
    ));
    let err = no_prompt(Exercise::Recording);
    assert_eq!(err.kind(), "invalid_selection");
    assert!(err.to_string().contains("Recording"));
  }

  #[tokio::test]
  async fn ended_sessions_are_unknown() {
    let (state, _root) = offline_state();
    let s = create_session(&state, None).await.unwrap();
    end_session(&state, &s.id).await.unwrap();
    assert!(matches!(snapshot(&state, &s.id).await, Err(PracticeError::UnknownSession(_))));
    assert!(matches!(end_session(&state, &s.id).await, Err(PracticeError::UnknownSession(_))));
  }

  #[tokio::test]
  async fn conversation_keeps_history_and_needs_the_exercise() {
    let (state, _root) = offline_state();
    let s = create_session(&state, None).await.unwrap();
    assert!(matches!(converse(&state, &s.id, "hello").await, Err(PracticeError::InvalidSelection(_))));

    configure(&state, &s.id, PracticeMode::Listening, Exercise::Conversation, GenerationMethod::Random).await.unwrap();
    converse(&state, &s.id, "hello").await.unwrap();
    let out = converse(&state, &s.id, "how are you?").await.unwrap();
    assert_eq!(out.conversation.len(), 4);
    assert_eq!(out.conversation[2], ChatTurn::user("how are you?"));
  }

  #[tokio::test]
  async fn speaking_without_delegate_is_an_upstream_error() {
    use base64::Engine;
    let (state, root) = offline_state();
    let s = create_session(&state, Some("Japanese")).await.unwrap();
    let pcm: Vec<u8> = [100i16, 200, 300].iter().flat_map(|x| x.to_le_bytes()).collect();
    let wav = pcm_to_wav(&pcm, 16_000).unwrap();
    let b64 = base64::engine::general_purpose::STANDARD.encode(&wav);

    assert!(matches!(speak(&state, &s.id, " ", &b64).await, Err(PracticeError::MissingInput("title"))));
    assert!(matches!(speak(&state, &s.id, "intro", "bm90IGEgd2F2").await, Err(PracticeError::Audio(_))));
    assert!(matches!(speak(&state, &s.id, "intro", &b64).await, Err(PracticeError::Upstream(_))));

    // the recording itself was kept
    let mut dir = tokio::fs::read_dir(root.join("speaking")).await.unwrap();
    let entry = dir.next_entry().await.unwrap().unwrap();
    assert!(entry.file_name().to_string_lossy().starts_with("intro_"));

    let _ = tokio::fs::remove_dir_all(&root).await;
  }

  #[tokio::test]
  async fn language_change_resets_rounds() {
    let (state, root) = offline_state();
    let s = create_session(&state, None).await.unwrap();
    configure(&state, &s.id, PracticeMode::Reading, Exercise::ShortAnswer, GenerationMethod::Random).await.unwrap();
    generate(&state, &s.id, PracticeMode::Reading, None, None).await.unwrap();

    let snap = set_language(&state, &s.id, "French").await.unwrap();
    assert_eq!(snap.language, "French");
    assert!(snap.rounds.iter().all(|r| r.phase == QuizPhase::Unconfigured && r.artifact.is_none()));
    assert!(matches!(set_language(&state, &s.id, "").await, Err(PracticeError::MissingInput("language"))));

    let _ = tokio::fs::remove_dir_all(&root).await;
  }
}
