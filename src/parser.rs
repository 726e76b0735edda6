//! Best-effort extraction of multiple-choice questions from model output.
//!
//! Two fixed layouts are understood:
//!
//! ```text
//! Question 1: What does ...?          1. What does ...?
//! a) ...                              A. ...
//! b) ...                              B. ...
//! c) ...                              C. ...
//! d) ...                              D. ...
//! Answer: B                           Answer: B
//! ```
//!
//! The text is first cut into blocks at every question header and each block is matched on its
//! own. A block that deviates from the layout (missing marker, other numbering) contributes nothing
//! and cannot swallow the block after it. Whitespace between markers is permissive.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{OptionLetter, Question};

/// Layout the model was asked to produce.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionTemplate {
  /// `Question N:` header, `a)`..`d)` options.
  Labeled,
  /// `N.` header, `A.`..`D.` options on their own lines.
  Numbered,
}

/// Result of a parse. `Empty` is an expected outcome that callers must handle, not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
  Parsed { questions: Vec<Question>, skipped: usize },
  Empty { blocks: usize },
}

impl ParseOutcome {
  pub fn questions(&self) -> &[Question] {
    match self {
      ParseOutcome::Parsed { questions, .. } => questions,
      ParseOutcome::Empty { .. } => &[],
    }
  }
}

fn compile(pattern: &str) -> Regex {
  Regex::new(pattern).expect("question pattern must compile")
}

fn labeled_header() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| compile(r"Question\s*\d+\s*:"))
}

fn labeled_block() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    compile(
      r"(?s)\AQuestion\s*\d+\s*:\s*(.*?)\s*a\)\s*(.*?)\s*b\)\s*(.*?)\s*c\)\s*(.*?)\s*d\)\s*(.*?)\s*Answer:\s*([A-Da-d])",
    )
  })
}

fn numbered_header() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| compile(r"(?m)^[ \t]*\d+\.[ \t]"))
}

fn numbered_block() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    compile(
      r"(?s)\A[ \t]*\d+\.\s*(.*?)\n\s*A\.\s*(.*?)\n\s*B\.\s*(.*?)\n\s*C\.\s*(.*?)\n\s*D\.\s*(.*?)\n\s*Answer:\s*([A-Da-d])",
    )
  })
}

impl QuestionTemplate {
  fn header(&self) -> &'static Regex {
    match self {
      QuestionTemplate::Labeled => labeled_header(),
      QuestionTemplate::Numbered => numbered_header(),
    }
  }

  fn block(&self) -> &'static Regex {
    match self {
      QuestionTemplate::Labeled => labeled_block(),
      QuestionTemplate::Numbered => numbered_block(),
    }
  }
}

/// Split `text` into one slice per question header, in order of appearance.
/// Anything before the first header is ignored.
fn split_blocks<'t>(text: &'t str, header: &Regex) -> Vec<&'t str> {
  let starts: Vec<usize> = header.find_iter(text).map(|m| m.start()).collect();
  starts
    .iter()
    .enumerate()
    .map(|(i, &start)| {
      let end = starts.get(i + 1).copied().unwrap_or(text.len());
      &text[start..end]
    })
    .collect()
}

fn question_from(caps: &Captures<'_>) -> Option<Question> {
  let body = |i: usize| caps.get(i).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
  let answer = caps.get(6)?.as_str().chars().next().and_then(OptionLetter::from_char)?;
  Some(Question {
    prompt: body(1),
    options: [body(2), body(3), body(4), body(5)],
    answer,
  })
}

/// Extract every well-formed question from `text`, in order.
pub fn parse_questions(text: &str, template: QuestionTemplate) -> ParseOutcome {
  let blocks = split_blocks(text, template.header());
  let questions: Vec<Question> = blocks
    .iter()
    .filter_map(|block| template.block().captures(block))
    .filter_map(|caps| question_from(&caps))
    .collect();

  let skipped = blocks.len() - questions.len();
  if skipped > 0 {
    warn!(target: "practice", ?template, blocks = blocks.len(), skipped, "Dropped malformed question blocks");
  }
  debug!(target: "practice", ?template, parsed = questions.len(), "Parsed question text");

  if questions.is_empty() {
    ParseOutcome::Empty { blocks: blocks.len() }
  } else {
    ParseOutcome::Parsed { questions, skipped }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn labeled(n: usize, answer: &str) -> String {
    format!(
      "Question {n}: What is item {n}?\na) first {n}\nb) second {n}\nc) third {n}\nd) fourth {n}\nAnswer: {answer}\n\n"
    )
  }

  fn numbered(n: usize, answer: &str) -> String {
    format!("{n}. What is item {n}?\nA. first {n}\nB. second {n}\nC. third {n}\nD. fourth {n}\nAnswer: {answer}\n\n")
  }

  #[test]
  fn five_labeled_blocks_give_five_questions() {
    let text: String = ["A", "b", "C", "d", "a"].iter().enumerate().map(|(i, a)| labeled(i + 1, a)).collect();
    let outcome = parse_questions(&text, QuestionTemplate::Labeled);
    let qs = outcome.questions();
    assert_eq!(qs.len(), 5);
    for q in qs {
      assert!(q.options.iter().all(|o| !o.is_empty()));
    }
    assert_eq!(qs[1].answer, OptionLetter::B);
    assert_eq!(qs[3].answer, OptionLetter::D);
    assert_eq!(qs[0].prompt, "What is item 1?");
    assert_eq!(qs[2].option(OptionLetter::C), "third 3");
  }

  #[test]
  fn block_without_answer_marker_is_dropped_alone() {
    let mut text = String::from("Here are your questions:\n\n");
    text.push_str(&labeled(1, "A"));
    text.push_str("Question 2: Broken one?\na) x\nb) y\nc) z\nd) w\n\n");
    text.push_str(&labeled(3, "C"));
    text.push_str(&labeled(4, "D"));
    text.push_str(&labeled(5, "B"));

    match parse_questions(&text, QuestionTemplate::Labeled) {
      ParseOutcome::Parsed { questions, skipped } => {
        assert_eq!(questions.len(), 4);
        assert_eq!(skipped, 1);
        assert_eq!(questions[1].prompt, "What is item 3?");
        assert_eq!(questions[1].option(OptionLetter::D), "fourth 3");
      }
      other => panic!("expected parsed questions, got {other:?}"),
    }
  }

  #[test]
  fn permissive_whitespace_and_multiline_bodies() {
    let text = "Question1 :   Which   word\nmeans happy?\n  a)glad\n\n b)   sad\nc) mad d) bad\nAnswer:c";
    let qs = parse_questions(text, QuestionTemplate::Labeled).questions().to_vec();
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].prompt, "Which   word\nmeans happy?");
    assert_eq!(qs[0].options, ["glad".to_string(), "sad".into(), "mad".into(), "bad".into()]);
    assert_eq!(qs[0].answer, OptionLetter::C);
  }

  #[test]
  fn empty_or_nonconforming_text_is_empty_outcome() {
    assert_eq!(parse_questions("", QuestionTemplate::Labeled), ParseOutcome::Empty { blocks: 0 });
    assert_eq!(parse_questions("I'm sorry, I can't do that.", QuestionTemplate::Numbered), ParseOutcome::Empty { blocks: 0 });
    // numbered text does not satisfy the labeled layout
    let text: String = (1..=5).map(|n| numbered(n, "A")).collect();
    assert!(matches!(parse_questions(&text, QuestionTemplate::Labeled), ParseOutcome::Empty { .. }));
  }

  #[test]
  fn numbered_layout_parses_with_lowercase_answers() {
    let text: String = ["a", "B", "c", "D", "a"].iter().enumerate().map(|(i, a)| numbered(i + 1, a)).collect();
    let qs = parse_questions(&text, QuestionTemplate::Numbered).questions().to_vec();
    assert_eq!(qs.len(), 5);
    assert_eq!(qs[0].answer, OptionLetter::A);
    assert_eq!(qs[2].answer, OptionLetter::C);
    assert_eq!(qs[4].option(OptionLetter::B), "second 5");
  }

  #[test]
  fn numbered_block_missing_an_option_is_skipped() {
    let mut text = numbered(1, "A");
    text.push_str("2. Only three?\nA. one\nB. two\nC. three\nAnswer: A\n\n");
    text.push_str(&numbered(3, "B"));
    match parse_questions(&text, QuestionTemplate::Numbered) {
      ParseOutcome::Parsed { questions, skipped } => {
        assert_eq!(questions.len(), 2);
        assert_eq!(skipped, 1);
      }
      other => panic!("expected parsed questions, got {other:?}"),
    }
  }
}
