//! Small utility helpers used across modules.

use std::sync::OnceLock;

use regex::{Captures, Regex};

fn placeholder() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern must compile"))
}

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values in a single pass,
/// so text inside a substituted value is never treated as a placeholder.
/// Unknown keys are left as written.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  placeholder()
    .replace_all(tpl, |caps: &Captures| {
      let key = &caps[1];
      match pairs.iter().find(|(k, _)| *k == key) {
        Some((_, v)) => v.to_string(),
        None => caps[0].to_string(),
      }
    })
    .into_owned()
}

/// Log-safe preview of large strings (char-boundary safe).
pub fn preview(s: &str, max_chars: usize) -> String {
  let mut it = s.chars();
  let head: String = it.by_ref().take(max_chars).collect();
  if it.next().is_some() { format!("{head}…") } else { head }
}

/// Reduce a user-supplied name to `[A-Za-z0-9._-]` so it can be embedded in a file name.
/// Path separators and other characters become `_`; leading dots are dropped.
pub fn sanitize_file_component(name: &str) -> String {
  let cleaned: String = name
    .trim()
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .collect();
  cleaned.trim_start_matches('.').to_string()
}

/// Word overlap between a reference and a submission, 0..=100.
/// Used by the offline fallbacks when no grader is configured.
pub fn word_overlap_percent(reference: &str, submission: &str) -> u32 {
  let norm = |s: &str| -> Vec<String> {
    s.split_whitespace()
      .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
      .filter(|w| !w.is_empty())
      .collect()
  };
  let reference = norm(reference);
  if reference.is_empty() {
    return 0;
  }
  let submission = norm(submission);
  let hits = reference.iter().filter(|w| submission.contains(w)).count();
  ((hits * 100) / reference.len()) as u32
}
