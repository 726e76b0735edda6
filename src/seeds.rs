//! Built-in content that keeps the service usable without a configured generation API.

use crate::domain::PracticeMode;
use crate::parser::QuestionTemplate;
use crate::util::word_overlap_percent;

/// Fallback passage used for listening and reading rounds.
pub const OFFLINE_PASSAGE: &str = "Every Saturday morning, Lena walks to the small market near the river. \
She buys fresh bread from an old baker named Tom, who always tells her a joke. \
Then she drinks a cup of tea at the corner café and reads the newspaper. \
At noon she goes home, cooks lunch for her brother, and they plan a walk in the park.";

pub const OFFLINE_WRITING_PROMPT: &str =
  "Describe your favourite place in your town. Explain why you like it and what people do there.";

/// Five questions about `OFFLINE_PASSAGE` in the labeled layout.
pub const OFFLINE_QUESTIONS_LABELED: &str = "Question 1: When does Lena go to the market?
a) Every Sunday evening
b) Every Saturday morning
c) Every Friday night
d) Every Monday afternoon
Answer: B

Question 2: Who sells bread to Lena?
a) Her brother
b) A young student
c) An old baker named Tom
d) The café owner
Answer: C

Question 3: What does Lena drink at the café?
a) A cup of tea
b) A glass of milk
c) A cup of coffee
d) Orange juice
Answer: A

Question 4: What does Lena read at the café?
a) A novel
b) A letter
c) A menu
d) The newspaper
Answer: D

Question 5: Who does Lena cook lunch for?
a) Her brother
b) Tom
c) Her neighbour
d) Nobody
Answer: A
";

/// The same five questions in the numbered layout.
pub const OFFLINE_QUESTIONS_NUMBERED: &str = "1. When does Lena go to the market?
A. Every Sunday evening
B. Every Saturday morning
C. Every Friday night
D. Every Monday afternoon
Answer: B

2. Who sells bread to Lena?
A. Her brother
B. A young student
C. An old baker named Tom
D. The café owner
Answer: C

3. What does Lena drink at the café?
A. A cup of tea
B. A glass of milk
C. A cup of coffee
D. Orange juice
Answer: A

4. What does Lena read at the café?
A. A novel
B. A letter
C. A menu
D. The newspaper
Answer: D

5. Who does Lena cook lunch for?
A. Her brother
B. Tom
C. Her neighbour
D. Nobody
Answer: A
";

/// Source text when no generator is available. Keywords are echoed so the learner sees them used.
pub fn offline_source(mode: PracticeMode, keywords: Option<&str>) -> String {
  let base = match mode {
    PracticeMode::Writing => OFFLINE_WRITING_PROMPT,
    _ => OFFLINE_PASSAGE,
  };
  match keywords.map(str::trim).filter(|k| !k.is_empty()) {
    Some(k) => format!("{base}\n\n(Keywords: {k})"),
    None => base.to_string(),
  }
}

pub fn offline_questions(template: QuestionTemplate) -> &'static str {
  match template {
    QuestionTemplate::Labeled => OFFLINE_QUESTIONS_LABELED,
    QuestionTemplate::Numbered => OFFLINE_QUESTIONS_NUMBERED,
  }
}

/// Local grade for a free-text submission: share of reference words the learner reproduced.
pub fn offline_analysis(reference: Option<&str>, student: &str) -> String {
  match reference.filter(|r| !r.trim().is_empty()) {
    Some(r) => {
      let pct = word_overlap_percent(r, student);
      format!("(local) score={pct}/100: {pct}% of the reference words appear in your text.")
    }
    None => {
      let words = student.split_whitespace().count();
      format!("(local) {words} words received. Detailed feedback needs the grading service.")
    }
  }
}

pub fn offline_quiz_feedback(report: &str) -> String {
  format!("(local) {report}")
}

pub fn offline_conversation_reply() -> String {
  "The conversation partner is offline right now. Try again once the generation service is configured.".into()
}
