//! Per-learner practice state.
//!
//! A `Session` owns one `PracticeRound` per practice mode. A round walks through
//!
//! ```text
//! Unconfigured -> AwaitingArtifact -> ArtifactReady -> AwaitingAnswers -> Scored
//! ```
//!
//! Changing the exercise or the generation method clears every downstream field and starts over
//! from `AwaitingArtifact`, whatever the current phase. `Scored` is terminal until `new_test`.
//!
//! Each reset bumps the round's `epoch`. Slow work (generation, grading) captures the epoch
//! before it starts and hands it back when installing results; results for an older epoch are
//! rejected so a reset round never receives content produced for its previous configuration.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Artifact, ChatTurn, Exercise, GenerationMethod, PracticeMode, Question};
use crate::parser::ParseOutcome;
use crate::scoring::{score_answers, ScoreCard};

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
  #[default]
  Unconfigured,
  AwaitingArtifact,
  ArtifactReady,
  AwaitingAnswers,
  Scored,
}

/// Rejections from the round state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
  NotConfigured,
  WrongPhase { action: &'static str, phase: QuizPhase },
  NotAQuiz,
  QuestionOutOfRange { index: usize, count: usize },
  EmptyAnswer,
  /// Parsing produced zero questions; the learner has to regenerate.
  NoUsableContent { blocks: usize },
  /// The round was reset while the result was being produced.
  Stale,
}

impl fmt::Display for SessionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SessionError::NotConfigured => write!(f, "Choose an exercise and a generation method first"),
      SessionError::WrongPhase { action, phase } => write!(f, "Cannot {action} while the round is {phase:?}"),
      SessionError::NotAQuiz => write!(f, "This exercise has no multiple-choice questions"),
      SessionError::QuestionOutOfRange { index, count } => {
        write!(f, "Question {index} does not exist (1..={count})")
      }
      SessionError::EmptyAnswer => write!(f, "Answer must not be empty"),
      SessionError::NoUsableContent { blocks } => write!(
        f,
        "No questions were parsed ({blocks} malformed blocks). Please generate a new test"
      ),
      SessionError::Stale => write!(f, "The round changed while this result was produced"),
    }
  }
}

impl std::error::Error for SessionError {}

/// State of one practice mode inside a session.
#[derive(Clone, Debug, Default)]
pub struct PracticeRound {
  exercise: Option<Exercise>,
  method: Option<GenerationMethod>,
  phase: QuizPhase,
  epoch: u64,
  artifact: Option<Artifact>,
  raw_questions: Option<String>,
  questions: Vec<Question>,
  answers: BTreeMap<usize, String>,
  score: Option<ScoreCard>,
  feedback: Option<String>,
  conversation: Vec<ChatTurn>,
}

impl PracticeRound {
  pub fn exercise(&self) -> Option<Exercise> {
    self.exercise
  }

  pub fn method(&self) -> Option<GenerationMethod> {
    self.method
  }

  pub fn phase(&self) -> QuizPhase {
    self.phase
  }

  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  pub fn artifact(&self) -> Option<&Artifact> {
    self.artifact.as_ref()
  }

  pub fn raw_questions(&self) -> Option<&str> {
    self.raw_questions.as_deref()
  }

  pub fn questions(&self) -> &[Question] {
    &self.questions
  }

  pub fn answers(&self) -> &BTreeMap<usize, String> {
    &self.answers
  }

  pub fn score(&self) -> Option<&ScoreCard> {
    self.score.as_ref()
  }

  pub fn feedback(&self) -> Option<&str> {
    self.feedback.as_deref()
  }

  pub fn conversation(&self) -> &[ChatTurn] {
    &self.conversation
  }

  fn is_quiz(&self) -> bool {
    self.exercise.map(|e| e.is_quiz()).unwrap_or(false)
  }

  /// Drop everything produced for the current configuration.
  fn clear_downstream(&mut self) {
    self.epoch += 1;
    self.artifact = None;
    self.raw_questions = None;
    self.questions.clear();
    self.answers.clear();
    self.score = None;
    self.feedback = None;
    self.conversation.clear();
  }

  /// Pick exercise + generation method. Returns true when this reset the round.
  pub fn select(&mut self, exercise: Exercise, method: GenerationMethod) -> bool {
    let unchanged = self.phase != QuizPhase::Unconfigured
      && self.exercise == Some(exercise)
      && self.method == Some(method);
    if unchanged {
      return false;
    }
    self.clear_downstream();
    self.exercise = Some(exercise);
    self.method = Some(method);
    self.phase = if exercise.needs_artifact() { QuizPhase::AwaitingArtifact } else { QuizPhase::ArtifactReady };
    true
  }

  /// Start producing an artifact; the returned epoch must be passed to `install_artifact`.
  pub fn begin_generation(&self) -> Result<u64, SessionError> {
    match self.phase {
      QuizPhase::Unconfigured => Err(SessionError::NotConfigured),
      QuizPhase::Scored => Err(SessionError::WrongPhase { action: "generate", phase: self.phase }),
      _ => Ok(self.epoch),
    }
  }

  /// Install a fresh artifact (and, for quizzes, its parsed questions).
  /// Returns the number of questions now presented.
  pub fn install_artifact(
    &mut self,
    epoch: u64,
    artifact: Artifact,
    raw_questions: Option<String>,
    parsed: Option<ParseOutcome>,
  ) -> Result<usize, SessionError> {
    if epoch != self.epoch {
      return Err(SessionError::Stale);
    }
    if self.exercise.is_none() {
      return Err(SessionError::NotConfigured);
    }
    if self.phase == QuizPhase::Scored {
      return Err(SessionError::WrongPhase { action: "install an artifact", phase: self.phase });
    }

    // Regeneration replaces the previous artifact; keep the epoch moving so any grading
    // still in flight for the old artifact is discarded.
    self.clear_downstream();
    self.artifact = Some(artifact);
    self.raw_questions = raw_questions;

    if self.is_quiz() {
      match parsed {
        Some(ParseOutcome::Parsed { questions, .. }) => {
          self.questions = questions;
        }
        Some(ParseOutcome::Empty { blocks }) => {
          self.phase = QuizPhase::AwaitingArtifact;
          return Err(SessionError::NoUsableContent { blocks });
        }
        None => {
          self.phase = QuizPhase::AwaitingArtifact;
          return Err(SessionError::NoUsableContent { blocks: 0 });
        }
      }
    }
    self.phase = QuizPhase::ArtifactReady;
    Ok(self.questions.len())
  }

  /// Record the learner's letter for a 1-based question index. The last selection wins.
  pub fn record_answer(&mut self, index: usize, letter: &str) -> Result<(), SessionError> {
    if !self.is_quiz() {
      return Err(SessionError::NotAQuiz);
    }
    if !matches!(self.phase, QuizPhase::ArtifactReady | QuizPhase::AwaitingAnswers) {
      return Err(SessionError::WrongPhase { action: "answer", phase: self.phase });
    }
    let count = self.questions.len();
    if index == 0 || index > count {
      return Err(SessionError::QuestionOutOfRange { index, count });
    }
    let letter = letter.trim();
    if letter.is_empty() {
      return Err(SessionError::EmptyAnswer);
    }
    self.answers.insert(index, letter.to_uppercase());
    self.phase = QuizPhase::AwaitingAnswers;
    Ok(())
  }

  /// Final submission: tally the score and freeze the round.
  pub fn submit(&mut self) -> Result<ScoreCard, SessionError> {
    if !self.is_quiz() {
      return Err(SessionError::NotAQuiz);
    }
    if !matches!(self.phase, QuizPhase::ArtifactReady | QuizPhase::AwaitingAnswers) {
      return Err(SessionError::WrongPhase { action: "submit", phase: self.phase });
    }
    let card = score_answers(&self.questions, &self.answers);
    self.score = Some(card.clone());
    self.phase = QuizPhase::Scored;
    Ok(card)
  }

  /// Artifact a free-text submission is judged against, with the epoch to hand back.
  pub fn analysis_context(&self) -> Result<(u64, Option<&Artifact>), SessionError> {
    match self.phase {
      QuizPhase::Unconfigured => Err(SessionError::NotConfigured),
      QuizPhase::AwaitingArtifact => Err(SessionError::WrongPhase { action: "analyze", phase: self.phase }),
      _ => Ok((self.epoch, self.artifact.as_ref())),
    }
  }

  pub fn attach_feedback(&mut self, epoch: u64, feedback: String) -> Result<(), SessionError> {
    if epoch != self.epoch {
      return Err(SessionError::Stale);
    }
    self.feedback = Some(feedback);
    Ok(())
  }

  pub fn push_turn(&mut self, turn: ChatTurn) {
    self.conversation.push(turn);
  }

  /// Reset every field, including the selection.
  pub fn new_test(&mut self) {
    let epoch = self.epoch + 1;
    *self = PracticeRound { epoch, ..Default::default() };
  }
}

/// Everything one learner has going on.
#[derive(Clone, Debug)]
pub struct Session {
  id: String,
  language: String,
  created_at: DateTime<Utc>,
  rounds: HashMap<PracticeMode, PracticeRound>,
}

impl Session {
  pub fn new(id: String, language: String) -> Self {
    Self { id, language, created_at: Utc::now(), rounds: HashMap::new() }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn language(&self) -> &str {
    &self.language
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  /// Switching language invalidates every round. Returns true when it changed.
  pub fn set_language(&mut self, language: &str) -> bool {
    if self.language == language {
      return false;
    }
    self.language = language.to_string();
    for round in self.rounds.values_mut() {
      round.new_test();
    }
    true
  }

  /// Read-only view; modes never touched yet read as a default round.
  pub fn round(&self, mode: PracticeMode) -> PracticeRound {
    self.rounds.get(&mode).cloned().unwrap_or_default()
  }

  pub fn round_mut(&mut self, mode: PracticeMode) -> &mut PracticeRound {
    self.rounds.entry(mode).or_default()
  }
}
