//! Application state: the in-memory session store, prompts, persistence root and OpenAI client.
//!
//! Sessions live only in memory. Every access goes through a short lock scope; callers never hold
//! the lock across a call to the OpenAI client.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::config::{load_config_from_env, PracticeSettings, Prompts};
use crate::error::PracticeError;
use crate::openai::OpenAI;
use crate::session::Session;
use crate::storage::ArtifactStore;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,
    pub openai: Option<OpenAI>,
    pub prompts: Prompts,
    pub settings: PracticeSettings,
    pub store: ArtifactStore,
}

impl AppState {
    /// Build state from env: load config, init OpenAI, pick the persistence root.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_config_from_env().unwrap_or_default();
        let store = ArtifactStore::from_env();

        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "leaf_backend", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, tts_model = %oa.tts_model, transcribe_model = %oa.transcribe_model, "OpenAI enabled.");
        } else {
            info!(target: "leaf_backend", "OpenAI disabled (no OPENAI_API_KEY). Using offline fallbacks.");
        }
        info!(target: "leaf_backend", data_dir = %store.root().display(), default_language = %cfg.practice.default_language, "Practice settings");

        Self::with_parts(openai, cfg.prompts, cfg.practice, store)
    }

    pub fn with_parts(
        openai: Option<OpenAI>,
        prompts: Prompts,
        settings: PracticeSettings,
        store: ArtifactStore,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            openai,
            prompts,
            settings,
            store,
        }
    }

    #[instrument(level = "debug", skip(self, session), fields(id = %session.id()))]
    pub async fn insert_session(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id().to_string(), session);
        debug!(target: "practice", total = sessions.len(), "Session stored");
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn remove_session(&self, id: &str) -> Result<Session, PracticeError> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions
            .remove(id)
            .ok_or_else(|| PracticeError::UnknownSession(id.to_string()))?;
        debug!(target: "practice", total = sessions.len(), "Session removed");
        Ok(removed)
    }

    /// Run `f` against a session under the read lock.
    pub async fn read_session<T>(
        &self,
        id: &str,
        f: impl FnOnce(&Session) -> T,
    ) -> Result<T, PracticeError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .map(f)
            .ok_or_else(|| PracticeError::UnknownSession(id.to_string()))
    }

    /// Run `f` against a session under the write lock.
    pub async fn update_session<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, PracticeError> {
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(id)
            .map(f)
            .ok_or_else(|| PracticeError::UnknownSession(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Exercise, GenerationMethod, PracticeMode};

    fn offline_state() -> AppState {
        AppState::with_parts(None, Prompts::default(), PracticeSettings::default(), ArtifactStore::new("."))
    }

    #[tokio::test]
    async fn sessions_are_found_by_id() {
        let state = offline_state();
        state.insert_session(Session::new("abc".into(), "English".into())).await;

        let lang = state.read_session("abc", |s| s.language().to_string()).await.unwrap();
        assert_eq!(lang, "English");

        state
            .update_session("abc", |s| {
                s.round_mut(PracticeMode::Reading).select(Exercise::ShortAnswer, GenerationMethod::Random)
            })
            .await
            .unwrap();
        let exercise = state.read_session("abc", |s| s.round(PracticeMode::Reading).exercise()).await.unwrap();
        assert_eq!(exercise, Some(Exercise::ShortAnswer));
    }

    #[tokio::test]
    async fn missing_sessions_are_reported() {
        let state = offline_state();
        let err = state.read_session("nope", |_| ()).await.unwrap_err();
        assert!(matches!(err, PracticeError::UnknownSession(id) if id == "nope"));
    }

    #[tokio::test]
    async fn removed_sessions_are_gone() {
        let state = offline_state();
        state.insert_session(Session::new("abc".into(), "English".into())).await;

        let removed = state.remove_session("abc").await.unwrap();
        assert_eq!(removed.id(), "abc");
        assert!(matches!(state.read_session("abc", |_| ()).await, Err(PracticeError::UnknownSession(_))));
        assert!(matches!(state.remove_session("abc").await, Err(PracticeError::UnknownSession(_))));
    }
}
