//! Content generation backends.
//!
//! One `ContentGenerator` implementation per backend, picked once from config by
//! `build_generator`. Remote backends return model text which goes through
//! `parse_generated`; text that is not the expected JSON still yields a usable
//! (display-only) quest with no canonical answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{GeneratorConfig, Prompts, Provider};
use crate::domain::QuestType;
use crate::error::GenerationError;
use crate::util::fill_template;

pub mod gemini;
pub mod offline;
pub mod openai;

#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub subject: String,
  pub difficulty: u8,
  pub quest_type: QuestType,
}

/// Generated quest content, as cached and as copied onto a `Quest`.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuest {
  pub question: String,
  pub choices: Vec<String>,
  pub correct_answer: Option<String>,
  pub explanation: String,
  #[serde(rename = "type")]
  pub quest_type: Option<QuestType>,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
  fn provider(&self) -> &'static str;
  async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedQuest, GenerationError>;
}

/// Render the (system, user) prompt pair for a request.
pub fn render_prompts(prompts: &Prompts, req: &GenerationRequest) -> (String, String) {
  let difficulty = req.difficulty.to_string();
  let pairs = [
    ("subject", req.subject.as_str()),
    ("difficulty", difficulty.as_str()),
    ("quest_type", req.quest_type.as_str()),
  ];
  (fill_template(&prompts.system, &pairs), fill_template(&prompts.user_template, &pairs))
}

#[derive(Deserialize)]
struct Payload {
  question: String,
  #[serde(default)]
  choices: Vec<Value>,
  #[serde(default, rename = "correctAnswer", alias = "correct_answer")]
  correct_answer: Option<Value>,
  #[serde(default)]
  explanation: Option<String>,
  #[serde(default, rename = "type")]
  quest_type: Option<Value>,
}

fn value_text(v: Value) -> Option<String> {
  match v {
    Value::Null => None,
    Value::String(s) => Some(s),
    other => Some(other.to_string()),
  }
}

/// Parse model output. Tolerates code fences and prose around the JSON object;
/// anything else becomes a display-only quest with the raw text as the question.
pub fn parse_generated(raw: &str) -> GeneratedQuest {
  let raw = raw.trim();
  let parsed = match (raw.find('{'), raw.rfind('}')) {
    (Some(start), Some(end)) if start < end => serde_json::from_str::<Payload>(&raw[start..=end]).ok(),
    _ => None,
  };

  match parsed {
    Some(p) if !p.question.trim().is_empty() => GeneratedQuest {
      question: p.question,
      choices: p.choices.into_iter().filter_map(value_text).collect(),
      correct_answer: p.correct_answer.and_then(value_text).filter(|a| !a.trim().is_empty()),
      explanation: p.explanation.unwrap_or_default(),
      quest_type: p.quest_type.and_then(|t| serde_json::from_value(t).ok()),
    },
    _ => {
      warn!(target: "generator", raw_len = raw.len(), "Unparseable generator payload; using raw text as question");
      GeneratedQuest {
        question: raw.to_string(),
        choices: vec![],
        correct_answer: None,
        explanation: String::new(),
        quest_type: None,
      }
    }
  }
}

/// Pick the backend named in config. Remote backends without an API key fall
/// back to the offline generator.
pub fn build_generator(cfg: &GeneratorConfig, prompts: &Prompts) -> Arc<dyn ContentGenerator> {
  let built: Option<Arc<dyn ContentGenerator>> = match cfg.provider {
    Provider::OpenAi | Provider::OpenRouter => openai::OpenAiCompatible::from_env(cfg, prompts)
      .map(|g| Arc::new(g) as Arc<dyn ContentGenerator>),
    Provider::Gemini => gemini::Gemini::from_env(cfg, prompts).map(|g| Arc::new(g) as Arc<dyn ContentGenerator>),
    Provider::Offline => None,
  };

  match built {
    Some(g) => {
      info!(target: "quest_engine", provider = g.provider(), "Content generator enabled.");
      g
    }
    None => {
      if cfg.provider != Provider::Offline {
        error!(target: "quest_engine", provider = cfg.provider.as_str(), "No API key for provider; using offline placeholder quests.");
      }
      Arc::new(offline::OfflineGenerator::default())
    }
  }
}
