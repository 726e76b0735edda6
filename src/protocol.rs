//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ArtifactOrigin, ChatTurn, Exercise, GenerationMethod, OptionLetter, PracticeMode};
use crate::language::Language;
use crate::scoring::ScoreCard;
use crate::session::{PracticeRound, QuizPhase, Session};

// ---------- HTTP requests ----------

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionIn {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LanguageIn {
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfigureIn {
    pub exercise: Exercise,
    #[serde(default)]
    pub method: Option<GenerationMethod>,
}

/// A text file picked by the learner.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadIn {
    pub filename: String,
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub upload: Option<UploadIn>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    /// 1-based question index.
    pub index: usize,
    pub letter: String,
}

#[derive(Debug, Deserialize)]
pub struct TextIn {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordIn {
    pub title: String,
    #[serde(rename = "audioBase64")]
    pub audio_base64: String,
}

// ---------- Responses ----------

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
    /// Whether the generation/grading API is configured.
    pub delegate: bool,
}

#[derive(Debug, Serialize)]
pub struct LanguagesOut {
    pub languages: &'static [Language],
    pub default: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub index: usize,
    pub prompt: String,
    pub options: [String; 4],
    /// Only revealed once the round is scored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<OptionLetter>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactOut {
    pub text: String,
    pub origin: ArtifactOrigin,
    pub source_name: Option<String>,
    pub has_audio: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOut {
    pub mode: PracticeMode,
    pub exercise: Option<Exercise>,
    pub method: Option<GenerationMethod>,
    pub phase: QuizPhase,
    pub artifact: Option<ArtifactOut>,
    pub questions: Vec<QuestionOut>,
    /// Generated question text as received, once the round is scored.
    pub questions_text: Option<String>,
    pub answers: BTreeMap<usize, String>,
    pub score: Option<ScoreCard>,
    pub feedback: Option<String>,
    pub conversation: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub id: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub rounds: Vec<RoundOut>,
}

/// Files written while serving a request, and persistence problems that did not fail it.
#[derive(Debug, Default, Serialize)]
pub struct SavedFiles {
    pub saved: Vec<String>,
    pub warnings: Vec<String>,
}

impl SavedFiles {
    /// Record the outcome of one write; failures become warnings.
    pub fn record(&mut self, what: &str, res: io::Result<PathBuf>) -> Option<PathBuf> {
        match res {
            Ok(path) => {
                self.saved.push(path.display().to_string());
                Some(path)
            }
            Err(e) => {
                warn!(target: "practice", %what, error = %e, "Failed to persist artifact");
                self.warnings.push(format!("Could not save {}: {}", what, e));
                None
            }
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateOut {
    pub round: RoundOut,
    #[serde(flatten)]
    pub files: SavedFiles,
}

#[derive(Debug, Serialize)]
pub struct SubmitOut {
    pub score: ScoreCard,
    pub report: String,
    pub feedback: String,
    #[serde(flatten)]
    pub files: SavedFiles,
}

#[derive(Debug, Serialize)]
pub struct AnalysisOut {
    pub feedback: String,
    #[serde(flatten)]
    pub files: SavedFiles,
}

#[derive(Debug, Serialize)]
pub struct RecordingOut {
    pub transcript: String,
    pub feedback: String,
    #[serde(flatten)]
    pub files: SavedFiles,
}

#[derive(Debug, Serialize)]
pub struct ChatOut {
    pub reply: String,
    pub conversation: Vec<ChatTurn>,
}

pub fn round_out(mode: PracticeMode, round: &PracticeRound) -> RoundOut {
    let reveal = round.phase() == QuizPhase::Scored;
    RoundOut {
        mode,
        exercise: round.exercise(),
        method: round.method(),
        phase: round.phase(),
        artifact: round.artifact().map(|a| ArtifactOut {
            text: a.text.clone(),
            origin: a.origin,
            source_name: a.source_name.clone(),
            has_audio: a.audio_path.is_some(),
        }),
        questions: round
            .questions()
            .iter()
            .enumerate()
            .map(|(i, q)| QuestionOut {
                index: i + 1,
                prompt: q.prompt.clone(),
                options: q.options.clone(),
                answer: reveal.then_some(q.answer),
            })
            .collect(),
        questions_text: round.raw_questions().filter(|_| reveal).map(str::to_string),
        answers: round.answers().clone(),
        score: round.score().cloned(),
        feedback: round.feedback().map(str::to_string),
        conversation: round.conversation().to_vec(),
    }
}

pub fn session_out(session: &Session) -> SessionOut {
    SessionOut {
        id: session.id().to_string(),
        language: session.language().to_string(),
        created_at: session.created_at(),
        rounds: PracticeMode::ALL
            .iter()
            .map(|&mode| round_out(mode, &session.round(mode)))
            .collect(),
    }
}

// ---------- WebSocket ----------

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    CreateSession {
        #[serde(default)]
        language: Option<String>,
    },
    GetSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    EndSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SetLanguage {
        #[serde(rename = "sessionId")]
        session_id: String,
        language: String,
    },
    Configure {
        #[serde(rename = "sessionId")]
        session_id: String,
        mode: PracticeMode,
        exercise: Exercise,
        #[serde(default)]
        method: Option<GenerationMethod>,
    },
    Generate {
        #[serde(rename = "sessionId")]
        session_id: String,
        mode: PracticeMode,
        #[serde(default)]
        keywords: Option<String>,
        #[serde(default)]
        upload: Option<UploadIn>,
    },
    Answer {
        #[serde(rename = "sessionId")]
        session_id: String,
        mode: PracticeMode,
        index: usize,
        letter: String,
    },
    Submit {
        #[serde(rename = "sessionId")]
        session_id: String,
        mode: PracticeMode,
    },
    Analyze {
        #[serde(rename = "sessionId")]
        session_id: String,
        mode: PracticeMode,
        text: String,
    },
    Reset {
        #[serde(rename = "sessionId")]
        session_id: String,
        mode: PracticeMode,
    },
    Record {
        #[serde(rename = "sessionId")]
        session_id: String,
        title: String,
        #[serde(rename = "audioBase64")]
        audio_base64: String,
    },
    Chat {
        #[serde(rename = "sessionId")]
        session_id: String,
        text: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session { session: SessionOut },
    Ended {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Round { round: RoundOut },
    Generated(GenerateOut),
    Scored(SubmitOut),
    Analysis(AnalysisOut),
    Recording(RecordingOut),
    ChatReply(ChatOut),
    Error { error: String, message: String },
}
