//! Quest Engine · AI tutor backend
//!
//! - Axum HTTP + WebSocket API for quests, answers, quotas and ad refills
//! - Pluggable LLM backends (OpenAI, OpenRouter, Gemini) with an offline fallback
//! - Fingerprint cache in front of generation
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   QUEST_CONFIG_PATH  : path to TOML config (quota, cache, generator, session, prompts)
//!   LLM_PROVIDER       : "openai" | "openrouter" | "gemini" | "offline", overrides the config
//!   OPENAI_API_KEY     : enables the OpenAI backend
//!   OPENROUTER_API_KEY : enables the OpenRouter backend
//!   GEMINI_API_KEY     : enables the Gemini backend
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod telemetry;
mod clock;
mod util;
mod domain;
mod difficulty;
mod scoring;
mod quota;
mod cache;
mod integrity;
mod error;
mod store;
mod config;
mod generator;
mod session;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (config, store, generator, quest engine).
  let state = Arc::new(AppState::new());

  // Periodically drop expired generation cache entries.
  let sweeper = state.clone();
  tokio::spawn(async move {
    let every = std::time::Duration::from_secs(sweeper.config.cache.sweep_interval_secs.max(1));
    let mut tick = tokio::time::interval(every);
    loop {
      tick.tick().await;
      sweeper.engine.sweep_cache().await;
    }
  });

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quest_engine", %addr, provider = state.engine.provider(), "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "quest_engine", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "quest_engine", "Shutdown signal received");
}
