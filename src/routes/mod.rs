//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Request body cap for recordings: about five minutes of 48 kHz 16-bit mono WAV as base64.
pub const RECORDING_BODY_LIMIT: usize = 40 * 1024 * 1024;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers); adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/languages", get(http::http_languages))
        .route("/api/v1/sessions", post(http::http_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(http::http_get_session).delete(http::http_end_session),
        )
        .route("/api/v1/sessions/:id/language", put(http::http_set_language))
        .route("/api/v1/sessions/:id/:mode/configure", post(http::http_configure))
        .route("/api/v1/sessions/:id/:mode/generate", post(http::http_generate))
        .route("/api/v1/sessions/:id/:mode/answer", post(http::http_answer))
        .route("/api/v1/sessions/:id/:mode/submit", post(http::http_submit))
        .route("/api/v1/sessions/:id/:mode/analyze", post(http::http_analyze))
        .route("/api/v1/sessions/:id/:mode/reset", post(http::http_reset))
        // Mode-specific: listening audio + chat, speaking recordings
        .route("/api/v1/sessions/:id/:mode/audio", get(http::http_audio))
        .route("/api/v1/sessions/:id/:mode/chat", post(http::http_chat))
        .route(
            "/api/v1/sessions/:id/:mode/record",
            post(http::http_record).layer(DefaultBodyLimit::max(RECORDING_BODY_LIMIT)),
        )
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tower::ServiceExt;

    use base64::Engine;

    use crate::audio::pcm_to_wav;
    use crate::config::{PracticeSettings, Prompts};
    use crate::storage::ArtifactStore;

    fn offline_app() -> (Router, PathBuf) {
        let root = std::env::temp_dir().join(format!("leaf-router-{}", uuid::Uuid::new_v4()));
        let state = AppState::with_parts(
            None,
            Prompts::default(),
            PracticeSettings::default(),
            ArtifactStore::new(&root),
        );
        (build_router(Arc::new(state)), root)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_and_languages() {
        let (app, _root) = offline_app();
        let (status, v) = call(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v, json!({ "ok": true, "delegate": false }));

        let (_, v) = call(&app, "GET", "/api/v1/languages", None).await;
        assert_eq!(v["languages"].as_array().unwrap().len(), 11);
        assert_eq!(v["languages"][1]["code"], "ja");
        assert_eq!(v["default"], "English");
    }

    #[tokio::test]
    async fn listening_quiz_flow_scores_and_reveals_answers() {
        let (app, root) = offline_app();
        let (status, s) = call(&app, "POST", "/api/v1/sessions", Some(json!({ "language": "Spanish" }))).await;
        assert_eq!(status, StatusCode::OK);
        let id = s["id"].as_str().unwrap().to_string();
        let base = format!("/api/v1/sessions/{}/listening", id);

        let (status, round) = call(
            &app,
            "POST",
            &format!("{base}/configure"),
            Some(json!({ "exercise": "multiple_choice", "method": "random" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(round["phase"], "awaiting_artifact");

        // submitting before anything was generated is a state conflict
        let (status, err) = call(&app, "POST", &format!("{base}/submit"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"], "invalid_state");

        let (status, gen) = call(&app, "POST", &format!("{base}/generate"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(gen["round"]["questions"].as_array().unwrap().len(), 5);
        assert!(gen["round"]["questions"][0].get("answer").is_none());
        assert!(gen["warnings"][0].as_str().unwrap().contains("Speech synthesis"));

        for (i, letter) in ["B", "C", "A", "D", "C"].iter().enumerate() {
            let (status, _) = call(
                &app,
                "POST",
                &format!("{base}/answer"),
                Some(json!({ "index": i + 1, "letter": letter })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = call(&app, "POST", &format!("{base}/answer"), Some(json!({ "index": 9, "letter": "A" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, out) = call(&app, "POST", &format!("{base}/submit"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["score"]["score"], 80);
        assert_eq!(out["score"]["maxScore"], 100);
        assert_eq!(out["score"]["results"][4]["submitted"], "C");

        let (_, snap) = call(&app, "GET", &format!("/api/v1/sessions/{}", id), None).await;
        assert_eq!(snap["language"], "Spanish");
        assert_eq!(snap["rounds"][0]["phase"], "scored");
        assert_eq!(snap["rounds"][0]["questions"][4]["answer"], "A");

        let (status, round) = call(&app, "POST", &format!("{base}/reset"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(round["phase"], "unconfigured");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn errors_map_to_statuses() {
        let (app, _root) = offline_app();
        let (status, err) = call(&app, "GET", "/api/v1/sessions/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["error"], "unknown_session");

        let (_, s) = call(&app, "POST", "/api/v1/sessions", None).await;
        let id = s["id"].as_str().unwrap();
        assert_eq!(s["language"], "English");

        let (status, err) = call(
            &app,
            "POST",
            &format!("/api/v1/sessions/{}/speaking/configure", id),
            Some(json!({ "exercise": "dictation" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "invalid_selection");

        let (status, _) = call(
            &app,
            "PUT",
            &format!("/api/v1/sessions/{}/language", id),
            Some(json!({ "language": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/v1/sessions/{}/reading/chat", id),
            Some(json!({ "text": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, err) = call(
            &app,
            "POST",
            &format!("/api/v1/sessions/{}/speaking/record", id),
            Some(json!({ "title": "intro", "audioBase64": "not base64 !!" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "invalid_audio");
    }

    #[tokio::test]
    async fn deleted_sessions_are_unknown() {
        let (app, _root) = offline_app();
        let (_, s) = call(&app, "POST", "/api/v1/sessions", None).await;
        let uri = format!("/api/v1/sessions/{}", s["id"].as_str().unwrap());

        let (status, _) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, err) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["error"], "unknown_session");

        let (status, _) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_optional_bodies_are_rejected() {
        let (app, _root) = offline_app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/sessions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"language": "#))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let err: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err["error"], "invalid_body");

        let (_, s) = call(&app, "POST", "/api/v1/sessions", None).await;
        let base = format!("/api/v1/sessions/{}/writing", s["id"].as_str().unwrap());
        call(
            &app,
            "POST",
            &format!("{base}/configure"),
            Some(json!({ "exercise": "composition", "method": "keywords" })),
        )
        .await;
        // a wrongly typed field is not silently dropped
        let (status, err) = call(&app, "POST", &format!("{base}/generate"), Some(json!({ "keywords": 42 }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["error"], "invalid_body");
    }

    #[tokio::test]
    async fn long_recordings_reach_the_speaking_flow() {
        let (app, root) = offline_app();
        let (_, s) = call(&app, "POST", "/api/v1/sessions", None).await;
        let id = s["id"].as_str().unwrap();

        // 20 s of 48 kHz mono encodes to more than 2 MB of base64
        let pcm: Vec<u8> = std::iter::repeat(1000i16.to_le_bytes()).take(48_000 * 20).flatten().collect();
        let wav = pcm_to_wav(&pcm, 48_000).unwrap();
        let audio = base64::engine::general_purpose::STANDARD.encode(&wav);
        assert!(audio.len() > 2 * 1024 * 1024);

        let (status, err) = call(
            &app,
            "POST",
            &format!("/api/v1/sessions/{}/speaking/record", id),
            Some(json!({ "title": "intro", "audioBase64": audio })),
        )
        .await;
        // offline there is no transcription, but the recording got through and was saved
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(err["error"], "upstream");
        let saved = std::fs::read_dir(root.join("speaking")).unwrap().count();
        assert_eq!(saved, 1);

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
