//! Quest session engine: the operations the HTTP and WebSocket handlers call.
//!
//!   - request a quest (quota, cached generation, fingerprinted persistence)
//!   - submit an answer (grading, integrity flags, difficulty, XP)
//!   - refill via ad, subscription status, quest lookup, generation preview
//!
//! Every read-modify-write of a user record happens under that user's lock.
//! Different users never contend.

use std::{collections::{BTreeSet, HashMap}, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{compute_key, content_fingerprint, FingerprintCache};
use crate::clock::Clock;
use crate::config::{AppConfig, SessionConfig};
use crate::difficulty::{self, clamp_difficulty};
use crate::domain::{CheatFlag, Quest, QuestType, User};
use crate::error::{GenerationError, QuestError, StoreError};
use crate::generator::{ContentGenerator, GeneratedQuest, GenerationRequest};
use crate::integrity;
use crate::quota::{self, QuotaConfig, QuotaDecision};
use crate::scoring;
use crate::store::Store;

/// Quest types the generator is asked for.
const REQUESTED_TYPES: [QuestType; 2] = [QuestType::MicroQuiz, QuestType::Explanation];

#[derive(Clone, Debug, PartialEq)]
pub struct SubmitOutcome {
  /// Exact match only.
  pub correct: bool,
  pub solved: bool,
  pub score: u8,
  pub cheat_flags: BTreeSet<CheatFlag>,
  /// The quest's canonical explanation.
  pub explanation: String,
  pub next_difficulty: u8,
  pub xp_awarded: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefillOutcome {
  pub success: bool,
  pub remaining: u32,
}

#[derive(Clone, Debug)]
pub struct Preview {
  pub cached: bool,
  pub provider: &'static str,
  pub data: GeneratedQuest,
}

type LockMap = Arc<std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>>;

/// One async mutex per user id, created on demand and dropped with its last holder.
#[derive(Default)]
struct UserLocks {
  inner: LockMap,
}

struct UserGuard {
  guard: Option<OwnedMutexGuard<()>>,
  user_id: String,
  map: LockMap,
}

impl Drop for UserGuard {
  fn drop(&mut self) {
    self.guard.take();
    let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
    // Only the map still references it: nobody holds or waits on this lock.
    if map.get(&self.user_id).is_some_and(|l| Arc::strong_count(l) == 1) {
      map.remove(&self.user_id);
    }
  }
}

impl UserLocks {
  async fn acquire(&self, user_id: &str) -> UserGuard {
    let lock = {
      let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
      map.entry(user_id.to_string()).or_default().clone()
    };
    UserGuard { guard: Some(lock.lock_owned().await), user_id: user_id.to_string(), map: self.inner.clone() }
  }

  #[cfg(test)]
  fn len(&self) -> usize {
    self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
  }
}

pub struct QuestEngine {
  store: Arc<dyn Store>,
  generator: Arc<dyn ContentGenerator>,
  clock: Arc<dyn Clock>,
  cache: FingerprintCache<GeneratedQuest>,
  quota: QuotaConfig,
  session: SessionConfig,
  generation_timeout: Duration,
  locks: UserLocks,
}

impl QuestEngine {
  pub fn new(
    cfg: &AppConfig,
    store: Arc<dyn Store>,
    generator: Arc<dyn ContentGenerator>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self {
      cache: FingerprintCache::from_config(&cfg.cache, clock.clone()),
      store,
      generator,
      clock,
      quota: cfg.quota.clone(),
      session: cfg.session.clone(),
      generation_timeout: Duration::from_secs(cfg.generator.timeout_secs),
      locks: UserLocks::default(),
    }
  }

  #[cfg(test)]
  pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
    self.generation_timeout = timeout;
    self
  }

  pub fn provider(&self) -> &'static str { self.generator.provider() }

  async fn load_user(&self, user_id: &str) -> Result<User, QuestError> {
    match self.store.find_user(user_id).await? {
      Some(u) => Ok(u),
      None if self.session.auto_provision_users => {
        info!(target: "quest", %user_id, "Provisioning new user record");
        Ok(User::new(user_id))
      }
      None => Err(QuestError::Unauthorized),
    }
  }

  async fn generate_bounded(&self, req: &GenerationRequest) -> Result<GeneratedQuest, GenerationError> {
    match tokio::time::timeout(self.generation_timeout, self.generator.generate(req)).await {
      Ok(res) => res,
      Err(_) => Err(GenerationError::Timeout(self.generation_timeout)),
    }
  }

  /// Authorize against the daily quota, then produce and persist a fresh quest.
  /// Quota is charged before generation; a failed generation keeps the charge unless
  /// `refund_on_generation_failure` is set.
  #[instrument(level = "info", skip(self), fields(%user_id, %subject))]
  pub async fn request_quest(&self, user_id: &str, subject: &str, difficulty: Option<u8>) -> Result<Quest, QuestError> {
    let subject = subject.trim();
    if subject.is_empty() {
      return Err(QuestError::InvalidRequest("missing subject"));
    }

    let (decision, difficulty) = {
      let _guard = self.locks.acquire(user_id).await;
      let mut user = self.load_user(user_id).await?;
      let decision = quota::authorize_and_consume(&self.quota, &mut user, self.clock.now());
      self.store.save_user(&user).await?;
      if let QuotaDecision::Denied(reason) = decision {
        info!(target: "quest", %user_id, free = user.daily_free_used, ad = user.daily_ad_used, "Quest request denied by quota");
        return Err(QuestError::QuotaExceeded(reason));
      }
      let difficulty = difficulty.map(clamp_difficulty).unwrap_or_else(|| user.difficulty_for(subject));
      (decision, difficulty)
    };

    let quest_type = REQUESTED_TYPES.choose(&mut rand::thread_rng()).copied().unwrap_or_default();
    let req = GenerationRequest { subject: subject.to_string(), difficulty, quest_type };

    match self.generate_and_store(user_id, &req).await {
      Ok(quest) => {
        info!(target: "quest", %user_id, quest_id = %quest.id, difficulty, ?decision, "Quest issued");
        Ok(quest)
      }
      Err(e) => {
        warn!(target: "quest", %user_id, error = %e, "Quest request failed after quota charge");
        if let (QuotaDecision::Charged(bucket), QuestError::GenerationFailed(_)) = (decision, &e) {
          if self.quota.refund_on_generation_failure {
            let _guard = self.locks.acquire(user_id).await;
            let mut user = self.load_user(user_id).await?;
            quota::refund(&mut user, bucket, self.clock.now());
            self.store.save_user(&user).await?;
            info!(target: "quest", %user_id, ?bucket, "Quota slot refunded");
          }
        }
        Err(e)
      }
    }
  }

  /// Cached generation first; on a (fingerprint, user) conflict generate fresh content,
  /// refresh the cache entry and try again.
  async fn generate_and_store(&self, user_id: &str, req: &GenerationRequest) -> Result<Quest, QuestError> {
    let key = compute_key(&req.subject, req.difficulty);
    let mut regenerations = 0;
    loop {
      let content = if regenerations == 0 {
        let (content, cached) = self.cache.get_or_insert_with(&key, || self.generate_bounded(req)).await?;
        if !cached && content.correct_answer.is_none() {
          // Fallback content is served once and never reused.
          self.cache.remove(&key).await;
        }
        content
      } else {
        let fresh = self.generate_bounded(req).await?;
        if fresh.correct_answer.is_some() {
          self.cache.put(&key, fresh.clone(), None).await;
        }
        fresh
      };

      let quest = self.build_quest(user_id, req, content, self.clock.now());
      match self.store.save_quest(&quest).await {
        Ok(()) => return Ok(quest),
        Err(StoreError::Conflict { fingerprint, .. }) if regenerations < self.session.max_regenerations => {
          regenerations += 1;
          warn!(target: "quest", %user_id, %fingerprint, regenerations, "Duplicate content for user; regenerating");
        }
        Err(e) => return Err(e.into()),
      }
    }
  }

  fn build_quest(&self, user_id: &str, req: &GenerationRequest, content: GeneratedQuest, now: DateTime<Utc>) -> Quest {
    Quest {
      id: Uuid::new_v4().to_string(),
      user_id: user_id.to_string(),
      subject: req.subject.clone(),
      quest_type: content.quest_type.unwrap_or(req.quest_type),
      difficulty: req.difficulty,
      fingerprint: content_fingerprint(&content.question),
      question: content.question,
      choices: content.choices,
      correct_answer: content.correct_answer,
      explanation: content.explanation,
      user_answer: None,
      user_explanation: None,
      score: None,
      solved: false,
      solved_at: None,
      cheat_flags: BTreeSet::new(),
      flagged: false,
      created_at: now,
    }
  }

  /// Grade a submission once. Flags are recorded but never change the outcome.
  #[instrument(level = "info", skip(self, answer, explanation), fields(%user_id, %quest_id, answer_len = answer.map_or(0, str::len)))]
  pub async fn submit_answer(
    &self,
    user_id: &str,
    quest_id: &str,
    answer: Option<&str>,
    explanation: Option<&str>,
  ) -> Result<SubmitOutcome, QuestError> {
    let _guard = self.locks.acquire(user_id).await;
    let mut user = self.load_user(user_id).await?;
    let mut quest = self.store.find_quest(quest_id).await?.ok_or(QuestError::NotFound("quest"))?;
    if quest.user_id != user.id {
      return Err(QuestError::Unauthorized);
    }
    if quest.is_submitted() {
      return Err(QuestError::AlreadySubmitted);
    }

    let now = self.clock.now();
    // No canonical answer (unparseable generator output): nothing to grade against.
    let graded = quest.correct_answer.as_deref().map(|expected| scoring::score(expected, answer));
    let score = graded.unwrap_or(0);
    let solved = graded.is_some_and(scoring::is_solved);
    if solved {
      quest.solved = true;
      quest.solved_at = Some(now);
    }

    let flags = integrity::evaluate(&quest, answer, explanation, &user);

    if graded.is_some() {
      quest.difficulty = difficulty::adjust(quest.difficulty, solved);
      user.set_difficulty_for(&quest.subject, quest.difficulty);
      user.record_result(solved, self.session.accuracy_window);
    }
    let xp_awarded = if solved { u64::from(score) } else { 0 };
    user.add_xp(xp_awarded);
    user.remember_fingerprint(&quest.fingerprint, self.session.recent_fingerprint_window);

    quest.score = graded;
    quest.user_answer = Some(answer.unwrap_or_default().to_string());
    quest.user_explanation = explanation.map(str::to_string);
    quest.flagged = !flags.is_empty();
    quest.cheat_flags = flags.clone();
    if quest.flagged {
      user.flag_count += 1;
      warn!(target: "quest", %user_id, %quest_id, ?flags, "Submission flagged for review");
    }

    self.store.save_submission(&quest, &user).await?;

    info!(target: "quest", %user_id, %quest_id, score, solved, next_difficulty = quest.difficulty, "Answer graded");
    Ok(SubmitOutcome {
      correct: score == 100,
      solved,
      score,
      cheat_flags: flags,
      explanation: quest.explanation.clone(),
      next_difficulty: quest.difficulty,
      xp_awarded,
    })
  }

  #[instrument(level = "info", skip(self), fields(%user_id))]
  pub async fn refill_via_ad(&self, user_id: &str) -> Result<RefillOutcome, QuestError> {
    let _guard = self.locks.acquire(user_id).await;
    let mut user = self.load_user(user_id).await?;
    let result = quota::refill_via_ad(&self.quota, &mut user, self.clock.now());
    self.store.save_user(&user).await?;
    match result {
      Ok(remaining) => Ok(RefillOutcome { success: true, remaining }),
      Err(reason) => Err(QuestError::AdLimitReached(reason)),
    }
  }

  pub async fn subscription_status(&self, user_id: &str) -> Result<bool, QuestError> {
    let user = self.load_user(user_id).await?;
    Ok(quota::subscription_status(&user))
  }

  /// A quest owned by the caller.
  pub async fn get_quest(&self, user_id: &str, quest_id: &str) -> Result<Quest, QuestError> {
    let quest = self.store.find_quest(quest_id).await?.ok_or(QuestError::NotFound("quest"))?;
    if quest.user_id != user_id {
      return Err(QuestError::Unauthorized);
    }
    Ok(quest)
  }

  /// Drop expired cache entries. Returns how many were removed.
  pub async fn sweep_cache(&self) -> usize {
    let purged = self.cache.purge_expired().await;
    if purged > 0 {
      let remaining = self.cache.len().await;
      debug!(target: "quest", purged, remaining, "Cache sweep");
    }
    purged
  }

  /// Cache-backed generation without quota or persistence.
  #[instrument(level = "info", skip(self), fields(%subject))]
  pub async fn preview(&self, subject: &str, difficulty: Option<u8>) -> Result<Preview, QuestError> {
    let subject = subject.trim();
    if subject.is_empty() {
      return Err(QuestError::InvalidRequest("missing subject"));
    }
    let difficulty = clamp_difficulty(difficulty.unwrap_or(1));
    let req = GenerationRequest { subject: subject.to_string(), difficulty, quest_type: QuestType::MicroQuiz };
    let key = compute_key(subject, difficulty);
    let (data, cached) = self.cache.get_or_insert_with(&key, || self.generate_bounded(&req)).await?;
    Ok(Preview { cached, provider: self.generator.provider(), data })
  }
}
