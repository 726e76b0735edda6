//! Tallying multiple-choice answers.
//!
//! Every correct answer is worth a fixed 20 points, so a full five-question set sums to 100.
//! The maximum reported next to the score is derived from the number of questions actually
//! presented, which keeps "score / max" honest when fewer than five questions survived parsing.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{OptionLetter, Question};

pub const POINTS_PER_QUESTION: u32 = 20;

/// Recorded when a question was never answered.
pub const NO_ANSWER: &str = "No Answer";

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
  /// 1-based, as shown to the learner.
  pub index: usize,
  pub correct: OptionLetter,
  pub submitted: String,
  pub is_correct: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCard {
  pub results: Vec<QuestionResult>,
  pub correct_count: usize,
  pub score: u32,
  pub max_score: u32,
}

/// Compare the learner's letters (keyed by 1-based question index) with the known answers.
pub fn score_answers(questions: &[Question], answers: &BTreeMap<usize, String>) -> ScoreCard {
  let results: Vec<QuestionResult> = questions
    .iter()
    .enumerate()
    .map(|(i, q)| {
      let index = i + 1;
      let submitted = answers
        .get(&index)
        .map(|a| a.trim().to_uppercase())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| NO_ANSWER.to_string());
      let is_correct = submitted == q.answer.as_str();
      QuestionResult { index, correct: q.answer, submitted, is_correct }
    })
    .collect();

  let correct_count = results.iter().filter(|r| r.is_correct).count();
  ScoreCard {
    correct_count,
    score: correct_count as u32 * POINTS_PER_QUESTION,
    max_score: questions.len() as u32 * POINTS_PER_QUESTION,
    results,
  }
}

impl ScoreCard {
  /// Plain-text tally handed to the grader for narrative feedback.
  pub fn report(&self, questions: &[Question]) -> String {
    let mut out = String::new();
    for (r, q) in self.results.iter().zip(questions) {
      // Quote the option text next to a letter so the grader sees what was picked.
      let picked = match r.submitted.chars().next().and_then(OptionLetter::from_char) {
        Some(letter) if r.submitted.len() == 1 => format!("{}) {}", letter, q.option(letter)),
        _ => r.submitted.clone(),
      };
      out.push_str(&format!(
        "Question {}: {}\nCorrect Answer: {}) {}\nStudent's Answer: {}\nResult: {}\n\n",
        r.index,
        q.prompt,
        r.correct,
        q.option(r.correct),
        picked,
        if r.is_correct { "Correct" } else { "Incorrect" },
      ));
    }
    out.push_str(&format!("Total Score: {}/{}", self.score, self.max_score));
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn questions(letters: &[OptionLetter]) -> Vec<Question> {
    letters
      .iter()
      .enumerate()
      .map(|(i, l)| Question {
        prompt: format!("q{}", i + 1),
        options: ["a".into(), "b".into(), "c".into(), "d".into()],
        answer: *l,
      })
      .collect()
  }

  fn answers(letters: &[&str]) -> BTreeMap<usize, String> {
    letters.iter().enumerate().map(|(i, l)| (i + 1, l.to_string())).collect()
  }

  #[test]
  fn three_of_five_scores_sixty() {
    use OptionLetter::*;
    let qs = questions(&[A, B, C, D, A]);
    let card = score_answers(&qs, &answers(&["A", "B", "X", "D", "B"]));
    assert_eq!(card.correct_count, 3);
    assert_eq!(card.score, 60);
    assert_eq!(card.max_score, 100);
    assert!(!card.results[2].is_correct);
    assert_eq!(card.results[2].submitted, "X");
  }

  #[test]
  fn missing_answers_count_as_no_answer() {
    use OptionLetter::*;
    let qs = questions(&[A, B, C, D, A]);
    let mut given = BTreeMap::new();
    given.insert(2, "b".to_string());
    let card = score_answers(&qs, &given);
    assert_eq!(card.score, 20);
    assert_eq!(card.results[0].submitted, NO_ANSWER);
    assert_eq!(card.results[1].submitted, "B");
    assert!(card.results[1].is_correct);
  }

  #[test]
  fn max_follows_question_count() {
    use OptionLetter::*;
    let qs = questions(&[A, B, C, D]);
    let card = score_answers(&qs, &answers(&["A", "B", "C", "D"]));
    assert_eq!(card.score, 80);
    assert_eq!(card.max_score, 80);
  }

  #[test]
  fn report_lists_each_question_and_total() {
    use OptionLetter::*;
    let qs = questions(&[A, C]);
    let card = score_answers(&qs, &answers(&["A", "B"]));
    let report = card.report(&qs);
    assert!(report.contains("Question 1: q1\nCorrect Answer: A) a\nStudent's Answer: A) a\nResult: Correct"));
    assert!(report.contains("Question 2: q2\nCorrect Answer: C) c\nStudent's Answer: B) b\nResult: Incorrect"));
    assert!(report.ends_with("Total Score: 20/40"));

    let card = score_answers(&qs, &BTreeMap::new());
    assert!(card.report(&qs).contains(&format!("Student's Answer: {}\n", NO_ANSWER)));
  }
}
