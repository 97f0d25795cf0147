//! Tracing setup for the quest engine.
//!
//! - LOG_LEVEL sets the filter, falling back to RUST_LOG, then to
//!   "info,quest=debug,quest_engine=debug,tower_http=info,axum=info".
//! - LOG_FORMAT=json switches to structured JSON lines; anything else is the
//!   human-readable formatter.
//!
//! Targets in use: `quest_engine` (process, transport), `quest` (session
//! operations, cache), `generator` (backend calls).

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,quest=debug,quest_engine=debug,tower_http=info,axum=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

pub fn init_tracing() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
