//! Google Gemini `generateContent` backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::openai::extract_openai_error;
use super::{parse_generated, render_prompts, ContentGenerator, GeneratedQuest, GenerationRequest};
use crate::config::{GeneratorConfig, Prompts};
use crate::error::GenerationError;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  max_tokens: u32,
  prompts: Prompts,
}

impl Gemini {
  pub fn from_env(cfg: &GeneratorConfig, prompts: &Prompts) -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_secs))
      .build()
      .ok()?;
    Some(Self {
      client,
      api_key,
      base_url: cfg.base_url.clone().unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".into()),
      model: cfg.model.clone().unwrap_or_else(|| "gemini-pro".into()),
      max_tokens: cfg.max_tokens,
      prompts: prompts.clone(),
    })
  }

  fn request_body(&self, system: &str, user: &str) -> GenerateContentRequest {
    GenerateContentRequest {
      contents: vec![Content {
        role: "user".into(),
        parts: vec![Part { text: format!("{system}\n\n{user}") }],
      }],
      generation_config: GenerationConfig { max_output_tokens: self.max_tokens },
    }
  }
}

#[async_trait]
impl ContentGenerator for Gemini {
  fn provider(&self) -> &'static str { "gemini" }

  #[instrument(level = "info", skip(self, req), fields(model = %self.model, subject = %req.subject, difficulty = req.difficulty))]
  async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedQuest, GenerationError> {
    let (system, user) = render_prompts(&self.prompts, req);
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let start = Instant::now();

    let res = self.client.post(&url)
      .query(&[("key", self.api_key.as_str())])
      .header(USER_AGENT, "quest-engine/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&self.request_body(&system, &user))
      .send()
      .await
      .map_err(|e| GenerationError::Http(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(target: "generator", elapsed = ?start.elapsed(), status, "Gemini call failed");
      return Err(GenerationError::Status { status, message });
    }

    let body: GenerateContentResponse = res.json().await.map_err(|e| GenerationError::Http(e.to_string()))?;
    let text = first_text(body).ok_or_else(|| GenerationError::Provider("Gemini returned no candidates".into()))?;
    info!(target: "generator", elapsed = ?start.elapsed(), response_len = text.len(), "Model response received");
    Ok(parse_generated(&text))
  }
}

fn first_text(body: GenerateContentResponse) -> Option<String> {
  body.candidates
    .into_iter()
    .next()?
    .content?
    .parts
    .into_iter()
    .find_map(|p| p.text)
    .filter(|t| !t.trim().is_empty())
}

// --- DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content { role: String, parts: Vec<Part> }
#[derive(Serialize)]
struct Part { text: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig { max_output_tokens: u32 }

#[derive(Deserialize)]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<CandidateContent> }
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<CandidatePart> }
#[derive(Deserialize)]
struct CandidatePart { #[serde(default)] text: Option<String> }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn first_candidate_text_is_used() {
    let body: GenerateContentResponse = serde_json::from_str(
      r#"{"candidates":[{"content":{"parts":[{"text":"{\"question\":\"Q\"}"}]}}]}"#,
    )
    .unwrap();
    assert_eq!(first_text(body).as_deref(), Some("{\"question\":\"Q\"}"));
  }

  #[test]
  fn empty_candidates_yield_nothing() {
    let body: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
    assert_eq!(first_text(body), None);
    let body: GenerateContentResponse = serde_json::from_str(r#"{}"#).unwrap();
    assert_eq!(first_text(body), None);
  }

  #[test]
  fn request_uses_camel_case_fields() {
    let v = serde_json::to_value(GenerateContentRequest {
      contents: vec![],
      generation_config: GenerationConfig { max_output_tokens: 400 },
    })
    .unwrap();
    assert_eq!(v["generationConfig"]["maxOutputTokens"], 400);
  }
}
