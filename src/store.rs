//! Persistence seam for users and quests, plus the in-memory implementation the
//! server runs with by default.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::domain::{Quest, User};
use crate::error::StoreError;

#[async_trait]
pub trait Store: Send + Sync {
  async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError>;
  async fn save_user(&self, user: &User) -> Result<(), StoreError>;
  async fn find_quest(&self, id: &str) -> Result<Option<Quest>, StoreError>;
  /// Insert or update by id. Fails with `StoreError::Conflict` when a different quest
  /// already holds the same (fingerprint, user) pair.
  async fn save_quest(&self, quest: &Quest) -> Result<(), StoreError>;
  /// Persist a graded quest and the updated user together: both writes land or neither does.
  async fn save_submission(&self, quest: &Quest, user: &User) -> Result<(), StoreError>;
}

type FingerprintIndex = HashMap<(String, String), String>;

#[derive(Default)]
pub struct MemoryStore {
  users: RwLock<HashMap<String, User>>,
  quests: RwLock<HashMap<String, Quest>>,
  // (fingerprint, user_id) -> quest id
  fingerprints: RwLock<FingerprintIndex>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  #[cfg(test)]
  pub async fn quest_count(&self) -> usize { self.quests.read().await.len() }
}

fn put_quest(quests: &mut HashMap<String, Quest>, index: &mut FingerprintIndex, quest: &Quest) -> Result<(), StoreError> {
  let key = (quest.fingerprint.clone(), quest.user_id.clone());
  if let Some(owner) = index.get(&key) {
    if owner != &quest.id {
      warn!(target: "quest", fingerprint = %quest.fingerprint, existing = %owner, "Duplicate quest content for user");
      return Err(StoreError::Conflict {
        fingerprint: quest.fingerprint.clone(),
        user_id: quest.user_id.clone(),
      });
    }
  }

  if let Some(prev) = quests.get(&quest.id) {
    if prev.fingerprint != quest.fingerprint || prev.user_id != quest.user_id {
      index.remove(&(prev.fingerprint.clone(), prev.user_id.clone()));
    }
  }
  index.insert(key, quest.id.clone());
  quests.insert(quest.id.clone(), quest.clone());
  Ok(())
}

#[async_trait]
impl Store for MemoryStore {
  async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
    Ok(self.users.read().await.get(id).cloned())
  }

  async fn save_user(&self, user: &User) -> Result<(), StoreError> {
    self.users.write().await.insert(user.id.clone(), user.clone());
    Ok(())
  }

  async fn find_quest(&self, id: &str) -> Result<Option<Quest>, StoreError> {
    Ok(self.quests.read().await.get(id).cloned())
  }

  #[instrument(level = "debug", skip(self, quest), fields(id = %quest.id, user = %quest.user_id))]
  async fn save_quest(&self, quest: &Quest) -> Result<(), StoreError> {
    let mut quests = self.quests.write().await;
    let mut index = self.fingerprints.write().await;
    put_quest(&mut quests, &mut index, quest)?;
    debug!(target: "quest", "Quest saved");
    Ok(())
  }

  #[instrument(level = "debug", skip(self, quest, user), fields(id = %quest.id, user = %user.id))]
  async fn save_submission(&self, quest: &Quest, user: &User) -> Result<(), StoreError> {
    // Lock order: users, quests, fingerprints.
    let mut users = self.users.write().await;
    let mut quests = self.quests.write().await;
    let mut index = self.fingerprints.write().await;
    put_quest(&mut quests, &mut index, quest)?;
    users.insert(user.id.clone(), user.clone());
    debug!(target: "quest", "Submission saved");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use std::collections::BTreeSet;

  fn quest(id: &str, fingerprint: &str, user: &str) -> Quest {
    Quest {
      id: id.into(),
      user_id: user.into(),
      subject: "math".into(),
      quest_type: Default::default(),
      difficulty: 1,
      fingerprint: fingerprint.into(),
      question: "1+1?".into(),
      choices: vec![],
      correct_answer: Some("2".into()),
      explanation: String::new(),
      user_answer: None,
      user_explanation: None,
      score: None,
      solved: false,
      solved_at: None,
      cheat_flags: BTreeSet::new(),
      flagged: false,
      created_at: Utc::now(),
    }
  }

  #[tokio::test]
  async fn same_fingerprint_for_same_user_conflicts() {
    let store = MemoryStore::new();
    store.save_quest(&quest("q1", "fp", "u1")).await.unwrap();
    let err = store.save_quest(&quest("q2", "fp", "u1")).await.unwrap_err();
    assert_eq!(err, StoreError::Conflict { fingerprint: "fp".into(), user_id: "u1".into() });
    // the first one was not overwritten
    assert_eq!(store.quest_count().await, 1);
    assert!(store.find_quest("q2").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn same_fingerprint_for_other_user_is_fine() {
    let store = MemoryStore::new();
    store.save_quest(&quest("q1", "fp", "u1")).await.unwrap();
    store.save_quest(&quest("q2", "fp", "u2")).await.unwrap();
    assert_eq!(store.quest_count().await, 2);
  }

  #[tokio::test]
  async fn resaving_a_quest_updates_in_place() {
    let store = MemoryStore::new();
    let mut q = quest("q1", "fp", "u1");
    store.save_quest(&q).await.unwrap();
    q.user_answer = Some("2".into());
    store.save_quest(&q).await.unwrap();
    let got = store.find_quest("q1").await.unwrap().unwrap();
    assert_eq!(got.user_answer.as_deref(), Some("2"));
  }

  #[tokio::test]
  async fn users_round_trip() {
    let store = MemoryStore::new();
    assert!(store.find_user("u1").await.unwrap().is_none());
    let mut u = User::new("u1");
    u.xp = 40;
    store.save_user(&u).await.unwrap();
    assert_eq!(store.find_user("u1").await.unwrap().unwrap().xp, 40);
  }

  #[tokio::test]
  async fn submission_conflict_leaves_user_untouched() {
    let store = MemoryStore::new();
    store.save_user(&User::new("u1")).await.unwrap();
    store.save_quest(&quest("q1", "fp", "u1")).await.unwrap();

    let mut u = User::new("u1");
    u.xp = 90;
    let err = store.save_submission(&quest("q2", "fp", "u1"), &u).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
    assert_eq!(store.find_user("u1").await.unwrap().unwrap().xp, 0);

    let mut q = quest("q1", "fp", "u1");
    q.score = Some(100);
    store.save_submission(&q, &u).await.unwrap();
    assert_eq!(store.find_user("u1").await.unwrap().unwrap().xp, 90);
    assert_eq!(store.find_quest("q1").await.unwrap().unwrap().score, Some(100));
  }
}
