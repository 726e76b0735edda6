//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::error::PracticeError;
use crate::logic;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "leaf_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "leaf_backend", "WebSocket connected");
  // Sessions created over this socket end with it.
  let mut owned: Vec<String> = Vec::new();
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "leaf_backend", message = ?incoming, "WS received");
            let creates = matches!(incoming, ClientWsMessage::CreateSession { .. });
            let reply_msg = handle_client_ws(incoming, &state).await;
            track_ownership(&mut owned, creates, &reply_msg);
            reply_msg
          }
          Err(e) => ServerWsMessage::Error { error: "invalid_json".into(), message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "error": "serialization", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "leaf_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  release_sessions(&state, owned).await;
  info!(target: "leaf_backend", "WebSocket disconnected");
}

fn track_ownership(owned: &mut Vec<String>, created: bool, reply: &ServerWsMessage) {
  match reply {
    ServerWsMessage::Session { session } if created => owned.push(session.id.clone()),
    ServerWsMessage::Ended { session_id } => owned.retain(|id| id != session_id),
    _ => {}
  }
}

async fn release_sessions(state: &AppState, owned: Vec<String>) {
  for id in owned {
    if let Err(e) = logic::end_session(state, &id).await {
      debug!(target: "practice", %id, error = %e, "Session already gone at disconnect");
    }
  }
}

fn reply<T>(res: Result<T, PracticeError>, wrap: impl FnOnce(T) -> ServerWsMessage) -> ServerWsMessage {
  match res {
    Ok(v) => wrap(v),
    Err(e) => {
      debug!(target: "practice", error = %e, "WS request rejected");
      ServerWsMessage::Error { error: e.kind().into(), message: e.to_string() }
    }
  }
}

async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::CreateSession { language } => reply(
      logic::create_session(state, language.as_deref()).await,
      |session| ServerWsMessage::Session { session },
    ),

    ClientWsMessage::GetSession { session_id } => reply(
      logic::snapshot(state, &session_id).await,
      |session| ServerWsMessage::Session { session },
    ),

    ClientWsMessage::EndSession { session_id } => {
      let res = logic::end_session(state, &session_id).await;
      reply(res, |()| ServerWsMessage::Ended { session_id })
    }

    ClientWsMessage::SetLanguage { session_id, language } => reply(
      logic::set_language(state, &session_id, &language).await,
      |session| ServerWsMessage::Session { session },
    ),

    ClientWsMessage::Configure { session_id, mode, exercise, method } => reply(
      logic::configure(state, &session_id, mode, exercise, method.unwrap_or_default()).await,
      |round| ServerWsMessage::Round { round },
    ),

    ClientWsMessage::Generate { session_id, mode, keywords, upload } => reply(
      logic::generate(state, &session_id, mode, keywords.as_deref(), upload.as_ref()).await,
      ServerWsMessage::Generated,
    ),

    ClientWsMessage::Answer { session_id, mode, index, letter } => reply(
      logic::answer(state, &session_id, mode, index, &letter).await,
      |round| ServerWsMessage::Round { round },
    ),

    ClientWsMessage::Submit { session_id, mode } => {
      let res = logic::submit(state, &session_id, mode).await;
      if let Ok(out) = &res {
        info!(target: "practice", %session_id, %mode, score = out.score.score, "WS submit evaluated");
      }
      reply(res, ServerWsMessage::Scored)
    }

    ClientWsMessage::Analyze { session_id, mode, text } => reply(
      logic::analyze(state, &session_id, mode, &text).await,
      ServerWsMessage::Analysis,
    ),

    ClientWsMessage::Reset { session_id, mode } => reply(
      logic::new_test(state, &session_id, mode).await,
      |round| ServerWsMessage::Round { round },
    ),

    ClientWsMessage::Record { session_id, title, audio_base64 } => reply(
      logic::speak(state, &session_id, &title, &audio_base64).await,
      ServerWsMessage::Recording,
    ),

    ClientWsMessage::Chat { session_id, text } => reply(
      logic::converse(state, &session_id, &text).await,
      ServerWsMessage::ChatReply,
    ),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{PracticeSettings, Prompts};
  use crate::storage::ArtifactStore;

  #[tokio::test]
  async fn ws_dispatch_replies_with_typed_messages() {
    let root = std::env::temp_dir().join(format!("leaf-ws-{}", uuid::Uuid::new_v4()));
    let state = AppState::with_parts(None, Prompts::default(), PracticeSettings::default(), ArtifactStore::new(&root));

    let created = handle_client_ws(ClientWsMessage::CreateSession { language: None }, &state).await;
    let session_id = match created {
      ServerWsMessage::Session { session } => session.id,
      other => panic!("unexpected reply: {:?}", other),
    };

    let msg: ClientWsMessage = serde_json::from_str(&format!(
      r#"{{"type":"submit","sessionId":"{}","mode":"listening"}}"#,
      session_id
    ))
    .unwrap();
    let v = serde_json::to_value(handle_client_ws(msg, &state).await).unwrap();
    assert_eq!(v["type"], "error");
    assert_eq!(v["error"], "invalid_state");

    let pong = serde_json::to_value(handle_client_ws(ClientWsMessage::Ping, &state).await).unwrap();
    assert_eq!(pong["type"], "pong");
  }

  #[tokio::test]
  async fn sessions_opened_on_a_socket_end_with_it() {
    let root = std::env::temp_dir().join(format!("leaf-ws-{}", uuid::Uuid::new_v4()));
    let state = AppState::with_parts(None, Prompts::default(), PracticeSettings::default(), ArtifactStore::new(&root));
    let mut owned = Vec::new();

    let first = handle_client_ws(ClientWsMessage::CreateSession { language: None }, &state).await;
    track_ownership(&mut owned, true, &first);
    let second = handle_client_ws(ClientWsMessage::CreateSession { language: None }, &state).await;
    track_ownership(&mut owned, true, &second);
    assert_eq!(owned.len(), 2);

    // looking a session up does not claim it
    let looked_up = handle_client_ws(ClientWsMessage::GetSession { session_id: owned[1].clone() }, &state).await;
    track_ownership(&mut owned, false, &looked_up);
    assert_eq!(owned.len(), 2);

    let ended = handle_client_ws(ClientWsMessage::EndSession { session_id: owned[0].clone() }, &state).await;
    let v = serde_json::to_value(&ended).unwrap();
    assert_eq!(v["type"], "ended");
    assert_eq!(v["sessionId"], owned[0].as_str());
    track_ownership(&mut owned, false, &ended);
    assert_eq!(owned.len(), 1);

    let remaining = owned[0].clone();
    release_sessions(&state, owned).await;
    let gone = handle_client_ws(ClientWsMessage::GetSession { session_id: remaining }, &state).await;
    let v = serde_json::to_value(gone).unwrap();
    assert_eq!(v["error"], "unknown_session");
  }
}
