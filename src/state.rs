//! Application state: configuration, the quest engine and its collaborators.
//!
//! This module owns:
//!   - the loaded `AppConfig` (TOML or defaults)
//!   - the store (in-memory by default)
//!   - the content generator picked from config
//!   - the `QuestEngine` wiring them together with the system clock

use std::sync::Arc;

use tracing::{info, instrument};

use crate::clock::SystemClock;
use crate::config::{load_config_from_env, AppConfig};
use crate::generator::{build_generator, ContentGenerator};
use crate::session::QuestEngine;
use crate::store::{MemoryStore, Store};

pub struct AppState {
    pub config: AppConfig,
    pub engine: QuestEngine,
}

impl AppState {
    /// Build state from env: load config, pick the generator, create the engine.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_config_from_env();
        let generator = build_generator(&config.generator, &config.prompts);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        Self::with_parts(config, store, generator)
    }

    pub fn with_parts(config: AppConfig, store: Arc<dyn Store>, generator: Arc<dyn ContentGenerator>) -> Self {
        info!(
            target: "quest_engine",
            provider = generator.provider(),
            daily_free_limit = config.quota.daily_free_limit,
            daily_ad_limit = config.quota.daily_ad_limit,
            cache_ttl_secs = config.cache.ttl_secs,
            auto_provision = config.session.auto_provision_users,
            "Quest engine configured"
        );
        let engine = QuestEngine::new(&config, store, generator, Arc::new(SystemClock));
        Self { config, engine }
    }
}
