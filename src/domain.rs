//! Domain models: users with their daily quota and progression, quests and their attempt.

use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::difficulty::clamp_difficulty;
use crate::util::normalize_subject;

/// What kind of quest is presented to the user?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum QuestType {
  MicroQuiz,
  MultiStep,
  CodingKata,
  Translation,
  Explanation,
}
impl Default for QuestType {
  fn default() -> Self { QuestType::MicroQuiz }
}
impl QuestType {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuestType::MicroQuiz => "micro-quiz",
      QuestType::MultiStep => "multi-step",
      QuestType::CodingKata => "coding-kata",
      QuestType::Translation => "translation",
      QuestType::Explanation => "explanation",
    }
  }
}

/// Advisory suspicion markers recorded on a submitted quest.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheatFlag {
  SuspiciouslyFast,
  WeakExplanation,
  QuestionAnswerIdentical,
  UnrealAccuracyStreak,
  DuplicateFingerprint,
}

/// Subscription record owned by the billing side; we only read `active`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Subscription {
  #[serde(default)] pub active: bool,
  #[serde(default)] pub plan: Option<String>,
  #[serde(default)] pub renews_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  pub xp: u64,
  pub level: u32,

  // Daily usage, reset on UTC day rollover.
  pub daily_free_used: u32,
  pub daily_ad_used: u32,
  pub quota_reset_at: Option<DateTime<Utc>>,

  #[serde(default)] pub subscription: Subscription,

  // Integrity signals.
  pub recent_accuracy: f64,
  pub recent_quest_count: u32,
  pub recent_fingerprints: VecDeque<String>,
  pub flag_count: u32,

  /// Adapted difficulty per normalized subject.
  #[serde(default)] pub subject_difficulty: HashMap<String, u8>,
}

impl User {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      xp: 0,
      level: 1,
      daily_free_used: 0,
      daily_ad_used: 0,
      quota_reset_at: None,
      subscription: Subscription::default(),
      recent_accuracy: 0.0,
      recent_quest_count: 0,
      recent_fingerprints: VecDeque::new(),
      flag_count: 0,
      subject_difficulty: HashMap::new(),
    }
  }

  pub fn is_subscribed(&self) -> bool { self.subscription.active }

  /// Add XP and level up while the current level's threshold (level * 100) is met.
  pub fn add_xp(&mut self, amount: u64) {
    self.xp += amount;
    loop {
      let required = u64::from(self.level) * 100;
      if self.xp < required { break; }
      self.xp -= required;
      self.level += 1;
    }
  }

  /// Remembered difficulty for a subject, 1 if never played.
  pub fn difficulty_for(&self, subject: &str) -> u8 {
    self.subject_difficulty
      .get(&normalize_subject(subject))
      .copied()
      .map(clamp_difficulty)
      .unwrap_or(1)
  }

  pub fn set_difficulty_for(&mut self, subject: &str, difficulty: u8) {
    self.subject_difficulty.insert(normalize_subject(subject), clamp_difficulty(difficulty));
  }

  pub fn remember_fingerprint(&mut self, fingerprint: &str, window: usize) {
    self.recent_fingerprints.push_back(fingerprint.to_string());
    while self.recent_fingerprints.len() > window {
      self.recent_fingerprints.pop_front();
    }
  }

  /// Running mean of solved/unsolved over at most `window` graded quests.
  pub fn record_result(&mut self, solved: bool, window: u32) {
    let n = f64::from(self.recent_quest_count.min(window.saturating_sub(1)));
    let hit = if solved { 1.0 } else { 0.0 };
    self.recent_accuracy = (self.recent_accuracy * n + hit) / (n + 1.0);
    self.recent_quest_count = self.recent_quest_count.saturating_add(1);
  }
}

/// One generated challenge and its (single) attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quest {
  pub id: String,
  pub user_id: String,
  pub subject: String,
  #[serde(rename = "type")]
  pub quest_type: QuestType,
  pub difficulty: u8,
  pub fingerprint: String,

  pub question: String,
  #[serde(default)] pub choices: Vec<String>,
  /// Absent when the generator payload could not be parsed; such quests cannot be graded.
  pub correct_answer: Option<String>,
  #[serde(default)] pub explanation: String,

  pub user_answer: Option<String>,
  pub user_explanation: Option<String>,
  pub score: Option<u8>,
  pub solved: bool,
  pub solved_at: Option<DateTime<Utc>>,
  #[serde(default)] pub cheat_flags: BTreeSet<CheatFlag>,
  #[serde(default)] pub flagged: bool,

  pub created_at: DateTime<Utc>,
}

impl Quest {
  pub fn is_submitted(&self) -> bool { self.user_answer.is_some() }
}
