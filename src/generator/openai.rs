//! OpenAI-compatible chat.completions backend, used for both OpenAI and OpenRouter.
//!
//! Calls log model names, latencies and response sizes, never contents or keys.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::{parse_generated, render_prompts, ContentGenerator, GeneratedQuest, GenerationRequest};
use crate::config::{GeneratorConfig, Prompts, Provider};
use crate::error::GenerationError;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct OpenAiCompatible {
  client: reqwest::Client,
  api_key: String,
  pub provider: Provider,
  pub base_url: String,
  pub model: String,
  max_tokens: u32,
  site_url: String,
  prompts: Prompts,
}

impl OpenAiCompatible {
  /// Construct the client if the provider's key is in the environment; otherwise None.
  pub fn from_env(cfg: &GeneratorConfig, prompts: &Prompts) -> Option<Self> {
    let (key_var, default_base, default_model) = match cfg.provider {
      Provider::OpenRouter => ("OPENROUTER_API_KEY", "https://openrouter.ai/api/v1", "openai/gpt-4o-mini"),
      _ => ("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4o-mini"),
    };
    let api_key = std::env::var(key_var).ok().filter(|k| !k.trim().is_empty())?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_secs))
      .build()
      .ok()?;

    Some(Self {
      client,
      api_key,
      provider: cfg.provider,
      base_url: cfg.base_url.clone().unwrap_or_else(|| default_base.into()),
      model: cfg.model.clone().unwrap_or_else(|| default_model.into()),
      max_tokens: cfg.max_tokens,
      site_url: cfg.site_url.clone(),
      prompts: prompts.clone(),
    })
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model, provider = self.provider.as_str()))]
  async fn chat_plain(&self, system: &str, user: &str) -> Result<String, GenerationError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      max_tokens: Some(self.max_tokens),
    };

    let mut builder = self.client.post(&url)
      .header(USER_AGENT, "quest-engine/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key));
    if self.provider == Provider::OpenRouter {
      builder = builder
        .header("HTTP-Referer", self.site_url.as_str())
        .header("X-Title", "AI Tutor RPG");
    }

    let res = builder.json(&req).send().await.map_err(|e| GenerationError::Http(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(GenerationError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| GenerationError::Http(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "generator", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Provider usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    Ok(text)
  }
}

#[async_trait]
impl ContentGenerator for OpenAiCompatible {
  fn provider(&self) -> &'static str { self.provider.as_str() }

  #[instrument(level = "info", skip(self, req), fields(subject = %req.subject, difficulty = req.difficulty))]
  async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedQuest, GenerationError> {
    let (system, user) = render_prompts(&self.prompts, req);
    let start = Instant::now();
    let result = self.chat_plain(&system, &user).await;
    let elapsed = start.elapsed();

    match result {
      Ok(text) => {
        info!(target: "generator", ?elapsed, response_len = text.len(), "Model response received");
        Ok(parse_generated(&text))
      }
      Err(e) => {
        error!(target: "generator", ?elapsed, error = %e, "Model call failed during quest generation");
        Err(e)
      }
    }
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

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

/// Try to extract a clean error message from an OpenAI-style error body.
pub(crate) fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
