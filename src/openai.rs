//! Minimal OpenAI-compatible client for our use-cases.
//!
//! We call chat.completions (plain text), audio/speech (raw PCM) and audio/transcriptions.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload previews short to avoid PII leaks.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::{PromptRequest, Sampling};
use crate::domain::ChatTurn;

const UA: &str = "leaf-backend/0.1";

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  /// Transcription endpoint base; may point at a local Whisper-compatible server.
  pub transcribe_base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub tts_model: String,
  pub tts_voice: String,
  pub transcribe_model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let transcribe_base_url = std::env::var("TRANSCRIBE_BASE_URL").unwrap_or_else(|_| base_url.clone());
    let env_or = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .ok()?;

    Some(Self {
      client,
      api_key,
      base_url,
      transcribe_base_url,
      fast_model: env_or("OPENAI_FAST_MODEL", "gpt-4o-mini"),
      strong_model: env_or("OPENAI_STRONG_MODEL", "gpt-4"),
      tts_model: env_or("OPENAI_TTS_MODEL", "tts-1"),
      tts_voice: env_or("OPENAI_TTS_VOICE", "alloy"),
      transcribe_model: env_or("OPENAI_TRANSCRIBE_MODEL", "whisper-1"),
    })
  }

  fn post(&self, url: &str) -> reqwest::RequestBuilder {
    self.client.post(url)
      .header(USER_AGENT, UA)
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
  }

  /// Chat completion over an explicit message list. Returns the trimmed text of the first choice.
  #[instrument(level = "info", skip(self, messages), fields(model = %model, messages = messages.len(), max_tokens = sampling.max_tokens))]
  async fn chat(&self, model: &str, messages: Vec<ChatMessageReq>, sampling: Sampling) -> Result<String, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages,
      temperature: sampling.temperature,
      max_tokens: Some(sampling.max_tokens),
    };

    let start = Instant::now();
    let res = self.post(&url)
      .header(CONTENT_TYPE, "application/json")
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      error!(elapsed = ?start.elapsed(), %status, "Chat completion failed");
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Chat completion received");

    Ok(text)
  }

  /// System + user request with the strong model (generation, grading, analysis).
  pub async fn complete(&self, req: &PromptRequest) -> Result<String, String> {
    let messages = vec![
      ChatMessageReq { role: "system".into(), content: req.system.clone() },
      ChatMessageReq { role: "user".into(), content: req.user.clone() },
    ];
    self.chat(&self.strong_model, messages, req.sampling).await
  }

  /// Continue a conversation (history already includes the newest user turn).
  pub async fn converse(&self, system: &str, history: &[ChatTurn], sampling: Sampling) -> Result<String, String> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessageReq { role: "system".into(), content: system.into() });
    messages.extend(history.iter().map(|t| ChatMessageReq { role: t.role.clone(), content: t.content.clone() }));
    self.chat(&self.fast_model, messages, sampling).await
  }

  /// Text-to-speech. Returns raw 16-bit mono PCM at 24 kHz.
  #[instrument(level = "info", skip(self, text), fields(model = %self.tts_model, voice = %self.tts_voice, text_len = text.len()))]
  pub async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>, String> {
    let url = format!("{}/audio/speech", self.base_url);
    let req = SpeechRequest {
      model: &self.tts_model,
      voice: &self.tts_voice,
      input: text,
      response_format: "pcm",
    };
    let start = Instant::now();
    let res = self.post(&url)
      .header(CONTENT_TYPE, "application/json")
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }
    let bytes = res.bytes().await.map_err(|e| e.to_string())?;
    info!(elapsed = ?start.elapsed(), pcm_len = bytes.len(), "Speech synthesized");
    Ok(bytes.to_vec())
  }

  /// Speech-to-text on a WAV recording with an explicit language code.
  #[instrument(level = "info", skip(self, wav), fields(model = %self.transcribe_model, %language_code, wav_len = wav.len()))]
  pub async fn transcribe(&self, wav: Vec<u8>, file_name: &str, language_code: &str) -> Result<String, String> {
    #[derive(Deserialize)]
    struct Transcript { text: String }

    let url = format!("{}/audio/transcriptions", self.transcribe_base_url);
    let part = reqwest::multipart::Part::bytes(wav)
      .file_name(file_name.to_string())
      .mime_str("audio/wav")
      .map_err(|e| e.to_string())?;
    let form = reqwest::multipart::Form::new()
      .part("file", part)
      .text("model", self.transcribe_model.clone())
      .text("language", language_code.to_string())
      .text("response_format", "json");

    let start = Instant::now();
    let res = self.post(&url).multipart(form).send().await.map_err(|e| e.to_string())?;
    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(format!("Transcription HTTP {}: {}", status, msg));
    }
    let t: Transcript = res.json().await.map_err(|e| e.to_string())?;
    info!(elapsed = ?start.elapsed(), text_len = t.text.len(), "Transcription received");
    Ok(t.text.trim().to_string())
  }
}

// --- DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Serialize)]
struct SpeechRequest<'a> {
  model: &'a str,
  voice: &'a str,
  input: &'a str,
  response_format: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
