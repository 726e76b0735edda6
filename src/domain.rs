//! Domain models: practice modes and their exercises, generation methods, questions, artifacts.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level skill being practiced. Each mode persists into a directory of the same name.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PracticeMode {
  Listening,
  Reading,
  Speaking,
  Writing,
}

impl PracticeMode {
  pub const ALL: [PracticeMode; 4] = [
    PracticeMode::Listening,
    PracticeMode::Reading,
    PracticeMode::Speaking,
    PracticeMode::Writing,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      PracticeMode::Listening => "listening",
      PracticeMode::Reading => "reading",
      PracticeMode::Speaking => "speaking",
      PracticeMode::Writing => "writing",
    }
  }

  /// Exercises offered by this mode, default first.
  pub fn exercises(&self) -> &'static [Exercise] {
    match self {
      PracticeMode::Listening => &[Exercise::Dictation, Exercise::MultipleChoice, Exercise::Conversation],
      PracticeMode::Reading => &[Exercise::ShortAnswer, Exercise::MultipleChoice],
      PracticeMode::Speaking => &[Exercise::Recording],
      PracticeMode::Writing => &[Exercise::Composition],
    }
  }

  pub fn offers(&self, exercise: Exercise) -> bool {
    self.exercises().contains(&exercise)
  }
}

impl fmt::Display for PracticeMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Practice sub-mode inside a mode.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Exercise {
  /// Listen to synthesized audio and type what was heard.
  Dictation,
  /// Five four-option questions about a passage.
  MultipleChoice,
  /// Free chat with the assistant.
  Conversation,
  /// Read a passage and answer its open questions in free text.
  ShortAnswer,
  /// Record speech, get it transcribed and graded.
  Recording,
  /// Write a text for a given prompt.
  Composition,
}

impl Exercise {
  pub fn is_quiz(&self) -> bool {
    matches!(self, Exercise::MultipleChoice)
  }

  /// Whether a source artifact (passage / prompt) has to be produced before practicing.
  pub fn needs_artifact(&self) -> bool {
    !matches!(self, Exercise::Conversation | Exercise::Recording)
  }
}

/// Where the source text of a round comes from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
  #[default]
  Random,
  Keywords,
  Upload,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionLetter {
  A,
  B,
  C,
  D,
}

impl OptionLetter {
  /// Accepts either case.
  pub fn from_char(c: char) -> Option<Self> {
    match c.to_ascii_uppercase() {
      'A' => Some(OptionLetter::A),
      'B' => Some(OptionLetter::B),
      'C' => Some(OptionLetter::C),
      'D' => Some(OptionLetter::D),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      OptionLetter::A => "A",
      OptionLetter::B => "B",
      OptionLetter::C => "C",
      OptionLetter::D => "D",
    }
  }

  fn index(&self) -> usize {
    *self as usize
  }
}

impl fmt::Display for OptionLetter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One multiple-choice question. Always exactly four options; the answer is one of them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
  pub prompt: String,
  pub options: [String; 4],
  pub answer: OptionLetter,
}

impl Question {
  pub fn option(&self, letter: OptionLetter) -> &str {
    &self.options[letter.index()]
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
  Generated,
  Uploaded,
}

/// Text a round is built around (passage or writing prompt), plus synthesized audio for listening.
#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
  pub text: String,
  pub origin: ArtifactOrigin,
  /// Original filename of an upload.
  pub source_name: Option<String>,
  pub audio_path: Option<PathBuf>,
}

/// One message of the listening conversation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
  pub role: String,
  pub content: String,
}

impl ChatTurn {
  pub fn user(content: impl Into<String>) -> Self {
    Self { role: "user".into(), content: content.into() }
  }

  pub fn assistant(content: impl Into<String>) -> Self {
    Self { role: "assistant".into(), content: content.into() }
  }
}
