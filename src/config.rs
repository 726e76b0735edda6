//! Loading service configuration (prompt templates + practice settings) from TOML.
//!
//! See `LeafConfig`, `Prompts` and `PracticeSettings` for the expected schema. Every field is
//! optional; anything left out keeps its default.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Exercise, PracticeMode};
use crate::language::DEFAULT_LANGUAGE;
use crate::parser::QuestionTemplate;
use crate::util::fill_template;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LeafConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub practice: PracticeSettings,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PracticeSettings {
  /// Language new sessions start with.
  pub default_language: String,
  /// Language the grader writes its feedback in.
  pub feedback_language: String,
}

impl Default for PracticeSettings {
  fn default() -> Self {
    Self { default_language: DEFAULT_LANGUAGE.into(), feedback_language: "Chinese".into() }
  }
}

/// Prompt templates sent to the generation/grading API.
///
/// Placeholders: `{language}`, `{keywords}`, `{reference}`, `{student}`, `{prompt}`,
/// `{report}`, `{feedback_language}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generator_system: String,
  // Listening passages
  pub listening_random: String,
  pub listening_keywords: String,
  // Reading passages (an uploaded text is passed as keywords)
  pub reading_random: String,
  pub reading_keywords: String,
  // Writing prompts
  pub writing_random: String,
  pub writing_keywords: String,
  // Question sets, one per layout understood by the parser
  pub questions_labeled: String,
  pub questions_numbered: String,
  // Quiz grading
  pub grading_system: String,
  pub grading_user_template: String,
  // Free-text analyses
  pub dictation_template: String,
  pub short_answer_template: String,
  pub writing_eval_system: String,
  pub writing_eval_template: String,
  pub speaking_eval_system: String,
  pub speaking_eval_template: String,
  // Listening conversation
  pub conversation_system: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generator_system: "You are a language-learning content generator. Reply only with the requested material.".into(),
      listening_random: "Please generate a random {language} paragraph for students to practice listening.".into(),
      listening_keywords: "Please generate a {language} paragraph based on the following keywords for students to practice listening:\n\nKeywords:\n{keywords}".into(),
      reading_random: "Please generate a random {language} paragraph for students to practice reading. Please also generate several questions based on the {language} paragraph in {language}.".into(),
      reading_keywords: "Please generate a {language} paragraph based on the following keywords for students to practice reading:\n\nKeywords:\n{keywords}\n\nPlease also generate several questions based on the {language} paragraph in {language}.".into(),
      writing_random: "Please generate a random {language} writing prompt (prompt must be in {language}) for a student to practice.".into(),
      writing_keywords: "Please generate a {language} writing prompt (prompt must be in {language}) based on the following keywords:\n\nKeywords:\n{keywords}".into(),
      questions_labeled: concat!(
        "Based on the following {language} text, please create five multiple-choice questions with four options each. ",
        "Ensure that the correct answers are indicated. Please format the questions and options clearly with each component on a new line:\n\n",
        "Text:\n{reference}\n\n",
        "Format:\n",
        "Question 1: question text (only the question text is in {language})\n",
        "a) Option A\nb) Option B\nc) Option C\nd) Option D\n",
        "Answer: <Correct Option Letter>\n\n",
        "Continue the same way up to Question 5. ",
        "Please make sure to include the 'Answer: X' line for each question."
      ).into(),
      questions_numbered: concat!(
        "Based on the following {language} text, please create five multiple-choice questions with four options each. ",
        "Ensure that the correct answers are indicated. Please format the questions and options clearly:\n\n",
        "Text:\n{reference}\n\n",
        "Format:\n1. Question text (only the question text is in {language})\n",
        "A. Option A\nB. Option B\nC. Option C\nD. Option D\nAnswer: X\n\n",
        "Please make sure to include the 'Answer: X' line for each question."
      ).into(),
      grading_system: "You are a supportive language teacher grading a multiple-choice test.".into(),
      grading_user_template: "Please analyze the student's answers to the following {language} multiple-choice questions.\n\n{report}\nPlease provide detailed feedback in {feedback_language}.".into(),
      dictation_template: concat!(
        "Please directly analyze the following {language} text provided by the student after they heard the following reference text:\n\n",
        "Reference Text:\n{reference}\n\nStudent Text:\n{student}\n\n",
        "Please use a 100-point grading system, provide detailed feedback in {feedback_language}, and list the following:\n",
        "1. The reference text (Make sure this part is in {language}).\n",
        "2. The text written by the student (Make sure this part is in {language}).\n",
        "3. Where points were deducted (in {feedback_language}).\n",
        "4. Suggestions on how to improve their listening skills (in {feedback_language})."
      ).into(),
      short_answer_template: concat!(
        "Please directly analyze the following {language} text provided by the student after they read the following reference text:\n\n",
        "Reference Text:\n{reference}\n\nStudent Text:\n{student}\n\n",
        "Please use a 100-point grading system, provide detailed feedback in {feedback_language}, and list the following:\n",
        "1. The reference text (Make sure this part is in {language}).\n",
        "2. The solutions given by the student based on the reference text (Make sure this part is in {language}).\n",
        "3. Where points were deducted (in {feedback_language}).\n",
        "4. Suggestions on how to improve their reading skills (in {feedback_language})."
      ).into(),
      writing_eval_system: "You are a helpful assistant who analyzes the quality of {language} writing and gives grades to students in {feedback_language}.".into(),
      writing_eval_template: concat!(
        "A student wrote the following {language} text based on the given prompt. Please analyze the student's writing for precision, clarity, ",
        "and grammatical correctness, and how well they addressed the prompt, in {feedback_language}.\n\n",
        "Prompt:\n{prompt}\n\nStudent's Writing:\n{student}\n\n",
        "Please do this one sentence at a time. Note: use a 100-point grading scale and show the grade at the end. ",
        "Provide detailed feedback and also list the original writing, potential improvements, and where you deducted points. ",
        "Everything here must be in {feedback_language}."
      ).into(),
      speaking_eval_system: "You are a helpful assistant who analyzes the quality of {language} speech and gives grades to students. Make sure to reply directly without saying sure or yes.".into(),
      speaking_eval_template: concat!(
        "Please analyze the following {language} speech of a student for pronunciation, fluency, and grammatical aspects. ",
        "Please do this one sentence at a time in {feedback_language}:\n\n{student}\n\n",
        "Note: please use a 100-point grading scale and show the grade at the end. Provide detailed feedback in {feedback_language} ",
        "and also list the original transcription, the potential improved transcription, and where you deducted points."
      ).into(),
      conversation_system: "You are a friendly conversation partner helping a student practice {language}. Reply in {language} and keep replies short.".into(),
    }
  }
}

/// Output bound and temperature for one kind of request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sampling {
  pub max_tokens: u32,
  pub temperature: f32,
}

const LISTENING_PASSAGE: Sampling = Sampling { max_tokens: 1500, temperature: 0.7 };
const READING_PASSAGE: Sampling = Sampling { max_tokens: 1000, temperature: 0.7 };
const WRITING_PROMPT: Sampling = Sampling { max_tokens: 150, temperature: 0.7 };
const LABELED_QUESTIONS: Sampling = Sampling { max_tokens: 2000, temperature: 0.7 };
const NUMBERED_QUESTIONS: Sampling = Sampling { max_tokens: 1500, temperature: 0.7 };
const GRADING: Sampling = Sampling { max_tokens: 1500, temperature: 0.7 };
const ANALYSIS: Sampling = Sampling { max_tokens: 2000, temperature: 0.5 };
pub const CONVERSATION: Sampling = Sampling { max_tokens: 1500, temperature: 0.7 };

/// A fully rendered chat request.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptRequest {
  pub system: String,
  pub user: String,
  pub sampling: Sampling,
}

impl Prompts {
  /// Passage (listening, reading) or writing prompt, optionally seeded with keywords.
  /// Speaking has no source text.
  pub fn source(&self, mode: PracticeMode, language: &str, keywords: Option<&str>) -> Option<PromptRequest> {
    let (random, seeded, sampling) = match mode {
      PracticeMode::Listening => (&self.listening_random, &self.listening_keywords, LISTENING_PASSAGE),
      PracticeMode::Reading => (&self.reading_random, &self.reading_keywords, READING_PASSAGE),
      PracticeMode::Writing => (&self.writing_random, &self.writing_keywords, WRITING_PROMPT),
      PracticeMode::Speaking => return None,
    };
    let keywords = keywords.map(str::trim).filter(|k| !k.is_empty());
    let user = match keywords {
      Some(k) => fill_template(seeded, &[("language", language), ("keywords", k)]),
      None => fill_template(random, &[("language", language)]),
    };
    Some(PromptRequest { system: self.generator_system.clone(), user, sampling })
  }

  pub fn questions(&self, template: QuestionTemplate, language: &str, reference: &str) -> PromptRequest {
    let (tpl, sampling) = match template {
      QuestionTemplate::Labeled => (&self.questions_labeled, LABELED_QUESTIONS),
      QuestionTemplate::Numbered => (&self.questions_numbered, NUMBERED_QUESTIONS),
    };
    PromptRequest {
      system: self.generator_system.clone(),
      user: fill_template(tpl, &[("language", language), ("reference", reference)]),
      sampling,
    }
  }

  pub fn grading(&self, language: &str, feedback_language: &str, report: &str) -> PromptRequest {
    PromptRequest {
      system: self.grading_system.clone(),
      user: fill_template(
        &self.grading_user_template,
        &[("language", language), ("feedback_language", feedback_language), ("report", report)],
      ),
      sampling: GRADING,
    }
  }

  /// Free-text analysis for an exercise; `reference` is the passage or writing prompt.
  pub fn analysis(
    &self,
    exercise: Exercise,
    language: &str,
    feedback_language: &str,
    reference: &str,
    student: &str,
  ) -> Option<PromptRequest> {
    let vars = [
      ("language", language),
      ("feedback_language", feedback_language),
      ("reference", reference),
      ("prompt", reference),
      ("student", student),
    ];
    let (system, user) = match exercise {
      Exercise::Dictation => (self.grading_system.clone(), fill_template(&self.dictation_template, &vars)),
      Exercise::ShortAnswer => (self.grading_system.clone(), fill_template(&self.short_answer_template, &vars)),
      Exercise::Composition => (
        fill_template(&self.writing_eval_system, &vars),
        fill_template(&self.writing_eval_template, &vars),
      ),
      Exercise::Recording => (
        fill_template(&self.speaking_eval_system, &vars),
        fill_template(&self.speaking_eval_template, &vars),
      ),
      Exercise::MultipleChoice | Exercise::Conversation => return None,
    };
    Some(PromptRequest { system, user, sampling: ANALYSIS })
  }

  pub fn conversation(&self, language: &str) -> String {
    fill_template(&self.conversation_system, &[("language", language)])
  }
}

/// Attempt to load `LeafConfig` from LEAF_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<LeafConfig> {
  let path = std::env::var("LEAF_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<LeafConfig>(&s) {
      Ok(cfg) => {
        info!(target: "leaf_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "leaf_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "leaf_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
