//! Loading service configuration (quota, cache, generator backend, session rules, prompts) from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! Secrets never live in the file: API keys come from the environment.

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::cache::CacheConfig;
use crate::quota::QuotaConfig;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)] pub quota: QuotaConfig,
  #[serde(default)] pub cache: CacheConfig,
  #[serde(default)] pub generator: GeneratorConfig,
  #[serde(default)] pub session: SessionConfig,
  #[serde(default)] pub prompts: Prompts,
}

/// Which content backend to talk to. Chosen once at startup.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
  #[serde(rename = "openai")]
  OpenAi,
  OpenRouter,
  Gemini,
  Offline,
}

impl Provider {
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_lowercase().as_str() {
      "openai" => Some(Provider::OpenAi),
      "openrouter" => Some(Provider::OpenRouter),
      "gemini" => Some(Provider::Gemini),
      "offline" => Some(Provider::Offline),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Provider::OpenAi => "openai",
      Provider::OpenRouter => "openrouter",
      Provider::Gemini => "gemini",
      Provider::Offline => "offline",
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeneratorConfig {
  #[serde(default = "default_provider")] pub provider: Provider,
  /// Model name; each backend has its own default.
  #[serde(default)] pub model: Option<String>,
  /// Override the backend's API base URL (proxies, self-hosted gateways).
  #[serde(default)] pub base_url: Option<String>,
  #[serde(default = "default_max_tokens")] pub max_tokens: u32,
  #[serde(default = "default_timeout_secs")] pub timeout_secs: u64,
  /// Sent as HTTP-Referer to OpenRouter.
  #[serde(default = "default_site_url")] pub site_url: String,
}
fn default_provider() -> Provider { Provider::OpenAi }
fn default_max_tokens() -> u32 { 400 }
fn default_timeout_secs() -> u64 { 20 }
fn default_site_url() -> String { "http://localhost:5173".into() }

impl Default for GeneratorConfig {
  fn default() -> Self {
    Self {
      provider: default_provider(),
      model: None,
      base_url: None,
      max_tokens: default_max_tokens(),
      timeout_secs: default_timeout_secs(),
      site_url: default_site_url(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
  /// Create a fresh user record for unknown ids instead of answering 401.
  #[serde(default)] pub auto_provision_users: bool,
  /// Fresh generations attempted after a (fingerprint, user) conflict.
  #[serde(default = "default_max_regenerations")] pub max_regenerations: u32,
  #[serde(default = "default_fingerprint_window")] pub recent_fingerprint_window: usize,
  #[serde(default = "default_accuracy_window")] pub accuracy_window: u32,
}
fn default_max_regenerations() -> u32 { 1 }
fn default_fingerprint_window() -> usize { 50 }
fn default_accuracy_window() -> u32 { 100 }

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      auto_provision_users: false,
      max_regenerations: default_max_regenerations(),
      recent_fingerprint_window: default_fingerprint_window(),
      accuracy_window: default_accuracy_window(),
    }
  }
}

/// Prompts sent to the content backend.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  /// Placeholders: {subject}, {difficulty}, {quest_type}
  pub user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You are an AI RPG tutor. Respond ONLY with strict JSON.".into(),
      user_template: "Create an educational RPG quest about \"{subject}\".\nQuest type: {quest_type}.\nDifficulty: {difficulty} (scale 1-10).\nReturn JSON with fields: {\"question\": string, \"choices\": string[] (optional), \"correctAnswer\": string, \"explanation\": string, \"type\": \"{quest_type}\"}. Keep the correct answer short.".into(),
    }
  }
}

impl AppConfig {
  pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(s)
  }
}

/// Load `AppConfig` from QUEST_CONFIG_PATH (defaults on any IO/parse error),
/// then apply the LLM_PROVIDER override.
pub fn load_config_from_env() -> AppConfig {
  let mut cfg = match std::env::var("QUEST_CONFIG_PATH") {
    Ok(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match AppConfig::from_toml(&s) {
        Ok(cfg) => {
          info!(target: "quest_engine", %path, "Loaded config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "quest_engine", %path, error = %e, "Failed to parse TOML config; using defaults");
          AppConfig::default()
        }
      },
      Err(e) => {
        error!(target: "quest_engine", %path, error = %e, "Failed to read TOML config file; using defaults");
        AppConfig::default()
      }
    },
    Err(_) => AppConfig::default(),
  };

  if let Ok(p) = std::env::var("LLM_PROVIDER") {
    match Provider::parse(&p) {
      Some(provider) => cfg.generator.provider = provider,
      None => warn!(target: "quest_engine", provider = %p, "Unsupported LLM_PROVIDER; keeping configured provider"),
    }
  }
  cfg
}
