//! Timestamped persistence of practice artifacts.
//!
//! Layout: `<root>/<mode>/<category>_<YYYYMMDD_HHMMSS>[_<original-stem>].<ext>`.
//! One file per artifact, no index and no cleanup. Callers treat a failed write as a warning.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, instrument};

use crate::domain::PracticeMode;
use crate::util::sanitize_file_component;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Clone, Debug)]
pub struct ArtifactStore {
  root: PathBuf,
}

impl ArtifactStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Root from LEAF_DATA_DIR (default: current directory).
  pub fn from_env() -> Self {
    Self::new(std::env::var("LEAF_DATA_DIR").unwrap_or_else(|_| ".".into()))
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn dir_for(&self, mode: PracticeMode) -> PathBuf {
    self.root.join(mode.as_str())
  }

  /// `<category>_<timestamp>[_<original stem>].<ext>`
  pub fn file_name(category: &str, at: &DateTime<Local>, original: Option<&str>, ext: &str) -> String {
    let category = sanitize_file_component(category);
    let stamp = at.format(TIMESTAMP_FORMAT);
    let stem = original
      .map(|o| Path::new(o).file_stem().and_then(|s| s.to_str()).unwrap_or(o).to_string())
      .map(|s| sanitize_file_component(&s))
      .filter(|s| !s.is_empty());
    match stem {
      Some(stem) => format!("{category}_{stamp}_{stem}.{ext}"),
      None => format!("{category}_{stamp}.{ext}"),
    }
  }

  #[instrument(level = "debug", skip(self, bytes), fields(%mode, %category, len = bytes.len()))]
  async fn write(
    &self,
    mode: PracticeMode,
    category: &str,
    original: Option<&str>,
    ext: &str,
    bytes: &[u8],
  ) -> io::Result<PathBuf> {
    let dir = self.dir_for(mode);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(Self::file_name(category, &Local::now(), original, ext));
    tokio::fs::write(&path, bytes).await?;
    debug!(target: "practice", path = %path.display(), "Artifact saved");
    Ok(path)
  }

  pub async fn save_text(
    &self,
    mode: PracticeMode,
    category: &str,
    text: &str,
    original: Option<&str>,
  ) -> io::Result<PathBuf> {
    self.write(mode, category, original, "txt", text.as_bytes()).await
  }

  pub async fn save_audio(&self, mode: PracticeMode, category: &str, wav: &[u8]) -> io::Result<PathBuf> {
    self.write(mode, category, None, "wav", wav).await
  }

  /// One `Question N: X` line per recorded answer.
  pub async fn save_answers(&self, mode: PracticeMode, answers: &BTreeMap<usize, String>) -> io::Result<PathBuf> {
    let body: String = answers.iter().map(|(i, a)| format!("Question {i}: {a}\n")).collect();
    self.save_text(mode, "user_answers", &body, None).await
  }
}
