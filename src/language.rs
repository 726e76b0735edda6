//! Languages a learner can practice, with the two-letter codes the speech-to-text side expects.

use serde::Serialize;

/// One selectable language.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Language {
  pub name: &'static str,
  pub code: &'static str,
  pub label: &'static str,
}

pub const DEFAULT_LANGUAGE: &str = "English";

/// Code used when a language has no entry in the table.
pub const FALLBACK_SPEECH_CODE: &str = "en";

pub const LANGUAGES: &[Language] = &[
  Language { name: "English",  code: "en", label: "🇬🇧 English" },
  Language { name: "Japanese", code: "ja", label: "🇯🇵 Japanese" },
  Language { name: "German",   code: "de", label: "🇩🇪 German" },
  Language { name: "French",   code: "fr", label: "🇫🇷 French" },
  Language { name: "Arabic",   code: "ar", label: "🇸🇦 Arabic" },
  Language { name: "Chinese",  code: "zh", label: "🇨🇳 Chinese" },
  Language { name: "Spanish",  code: "es", label: "🇪🇸 Spanish" },
  Language { name: "Russian",  code: "ru", label: "🇷🇺 Russian" },
  Language { name: "Korean",   code: "ko", label: "🇰🇷 Korean" },
  Language { name: "Greek",    code: "el", label: "🇬🇷 Greek" },
  Language { name: "Xhosa",    code: "xh", label: "🇿🇦 Xhosa" },
];

/// Case-insensitive lookup by display name.
pub fn find(name: &str) -> Option<&'static Language> {
  let name = name.trim();
  LANGUAGES.iter().find(|l| l.name.eq_ignore_ascii_case(name))
}

/// Speech-to-text language code; unknown names quietly become English.
pub fn speech_code(name: &str) -> &'static str {
  find(name).map(|l| l.code).unwrap_or(FALLBACK_SPEECH_CODE)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_ignores_case_and_whitespace() {
    let l = find("  japanese ").expect("japanese is in the table");
    assert_eq!(l.name, "Japanese");
    assert_eq!(l.code, "ja");
  }

  #[test]
  fn unmapped_language_defaults_to_english_code() {
    assert_eq!(speech_code("Klingon"), "en");
    assert_eq!(speech_code("Korean"), "ko");
    assert_eq!(speech_code("Xhosa"), "xh");
  }

  #[test]
  fn default_language_is_selectable() {
    assert!(find(DEFAULT_LANGUAGE).is_some());
  }
}
