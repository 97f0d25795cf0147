//! Content-addressed generation cache and content fingerprints.
//!
//! The cache maps `compute_key(subject, difficulty)` to previously generated content.
//! Entries expire lazily on read. Concurrent misses on one key may both call the
//! generator; the last write wins.
//!
//! `content_fingerprint` hashes the question text a quest actually carries. That hash,
//! together with the store's (fingerprint, user) uniqueness, keeps a user from ever
//! holding two identical questions.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::clock::Clock;
use crate::util::normalize_subject;

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_ttl_secs")] pub ttl_secs: u64,
  /// How often expired entries are swept out.
  #[serde(default = "default_sweep_interval_secs")] pub sweep_interval_secs: u64,
}
fn default_ttl_secs() -> u64 { 6 * 60 * 60 }
fn default_sweep_interval_secs() -> u64 { 10 * 60 }

impl Default for CacheConfig {
  fn default() -> Self { Self { ttl_secs: default_ttl_secs(), sweep_interval_secs: default_sweep_interval_secs() } }
}

/// Deterministic cache key for a (subject, difficulty) pair.
pub fn compute_key(subject: &str, difficulty: u8) -> String {
  sha256_hex(&format!("{}|{}", normalize_subject(subject), difficulty))
}

/// Fingerprint of the generated question text itself.
pub fn content_fingerprint(question: &str) -> String {
  sha256_hex(&normalize_subject(question))
}

fn sha256_hex(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex::encode(hasher.finalize())
}

fn short_key(key: &str) -> &str {
  key.get(..12).unwrap_or(key)
}

struct CacheEntry<V> {
  value: V,
  expires_at: DateTime<Utc>,
}

pub struct FingerprintCache<V> {
  entries: RwLock<HashMap<String, CacheEntry<V>>>,
  clock: Arc<dyn Clock>,
  default_ttl: Duration,
}

impl<V: Clone + Send + Sync> FingerprintCache<V> {
  pub fn new(clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
    Self { entries: RwLock::new(HashMap::new()), clock, default_ttl }
  }

  pub fn from_config(cfg: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
    Self::new(clock, Duration::from_secs(cfg.ttl_secs))
  }

  fn expiry(&self, ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
    self.clock.now() + ttl
  }

  pub async fn get(&self, key: &str) -> Option<V> {
    let now = self.clock.now();
    {
      let entries = self.entries.read().await;
      match entries.get(key) {
        Some(e) if e.expires_at > now => return Some(e.value.clone()),
        Some(_) => {}
        None => return None,
      }
    }
    // Expired: evict under the write lock, re-checking in case it was refreshed meanwhile.
    let mut entries = self.entries.write().await;
    if entries.get(key).is_some_and(|e| e.expires_at <= now) {
      entries.remove(key);
      debug!(target: "quest", key = short_key(key), "Cache entry expired");
    }
    None
  }

  /// Insert with the given TTL, or the default one.
  pub async fn put(&self, key: &str, value: V, ttl: Option<Duration>) {
    let expires_at = self.expiry(ttl.unwrap_or(self.default_ttl));
    self.entries.write().await.insert(key.to_string(), CacheEntry { value, expires_at });
  }

  pub async fn remove(&self, key: &str) -> bool {
    self.entries.write().await.remove(key).is_some()
  }

  /// Drop every expired entry. Returns how many were removed.
  pub async fn purge_expired(&self) -> usize {
    let now = self.clock.now();
    let mut entries = self.entries.write().await;
    let before = entries.len();
    entries.retain(|_, e| e.expires_at > now);
    before - entries.len()
  }

  pub async fn len(&self) -> usize { self.entries.read().await.len() }

  /// Read-through: on a miss run `make` once and write the result back.
  /// Returns the value and whether it came from the cache. Errors are not cached.
  #[instrument(level = "debug", skip(self, key, make), fields(key = short_key(key)))]
  pub async fn get_or_insert_with<F, Fut, E>(&self, key: &str, make: F) -> Result<(V, bool), E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
  {
    if let Some(v) = self.get(key).await {
      debug!(target: "quest", "Cache hit");
      return Ok((v, true));
    }
    let v = make().await?;
    self.put(key, v.clone(), None).await;
    Ok((v, false))
  }
}
