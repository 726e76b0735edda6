//! LEAF · Language practice backend
//!
//! - Axum HTTP + WebSocket API over per-session practice rounds
//! - Optional OpenAI integration for generation, grading, speech (via environment variables)
//! - Timestamped persistence of every artifact under LEAF_DATA_DIR
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   OPENAI_API_KEY       : enables OpenAI integration if present
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_STRONG_MODEL  : default "gpt-4" (generation, grading)
//!   OPENAI_FAST_MODEL    : default "gpt-4o-mini" (conversation)
//!   TRANSCRIBE_BASE_URL  : speech-to-text endpoint base, defaults to OPENAI_BASE_URL
//!   LEAF_DATA_DIR        : persistence root (default ".")
//!   LEAF_CONFIG_PATH     : path to TOML config (prompts + practice settings)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod audio;
mod config;
mod domain;
mod error;
mod language;
mod logic;
mod openai;
mod parser;
mod protocol;
mod routes;
mod scoring;
mod seeds;
mod session;
mod state;
mod storage;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: session store, OpenAI client, prompts, persistence root.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "leaf_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "leaf_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "leaf_backend", error = %e, "Could not listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "leaf_backend", "Shutdown requested");
}
