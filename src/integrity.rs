//! Heuristic integrity checks on a submission.
//!
//! Each rule looks at the submission on its own and every matching rule contributes
//! its flag. Flags are advisory: they are stored on the quest for moderation and never
//! change the score, XP or difficulty.

use std::collections::BTreeSet;

use crate::domain::{CheatFlag, Quest, User};

pub const MIN_SOLVE_MS: i64 = 2000;
pub const MIN_EXPLANATION_CHARS: usize = 5;
pub const STREAK_ACCURACY: f64 = 0.95;
pub const STREAK_MIN_QUESTS: u32 = 50;

/// Everything a rule may look at.
pub struct Submission<'a> {
  pub quest: &'a Quest,
  pub answer: Option<&'a str>,
  pub explanation: Option<&'a str>,
  pub user: &'a User,
}

type Rule = fn(&Submission<'_>) -> Option<CheatFlag>;

const RULES: &[Rule] = &[
  suspiciously_fast,
  weak_explanation,
  question_answer_identical,
  unreal_accuracy_streak,
  duplicate_fingerprint,
];

pub fn evaluate(quest: &Quest, answer: Option<&str>, explanation: Option<&str>, user: &User) -> BTreeSet<CheatFlag> {
  let sub = Submission { quest, answer, explanation, user };
  RULES.iter().filter_map(|rule| rule(&sub)).collect()
}

fn suspiciously_fast(s: &Submission<'_>) -> Option<CheatFlag> {
  let solved_at = s.quest.solved_at?;
  let elapsed = solved_at - s.quest.created_at;
  (elapsed.num_milliseconds() < MIN_SOLVE_MS).then_some(CheatFlag::SuspiciouslyFast)
}

fn weak_explanation(s: &Submission<'_>) -> Option<CheatFlag> {
  let weak = s
    .explanation
    .map_or(true, |e| e.trim().chars().count() < MIN_EXPLANATION_CHARS);
  weak.then_some(CheatFlag::WeakExplanation)
}

fn question_answer_identical(s: &Submission<'_>) -> Option<CheatFlag> {
  let answer = s.answer.filter(|a| !a.is_empty())?;
  if s.quest.question.is_empty() {
    return None;
  }
  (simple_hash(&s.quest.question) == simple_hash(answer)).then_some(CheatFlag::QuestionAnswerIdentical)
}

fn unreal_accuracy_streak(s: &Submission<'_>) -> Option<CheatFlag> {
  (s.user.recent_accuracy > STREAK_ACCURACY && s.user.recent_quest_count > STREAK_MIN_QUESTS)
    .then_some(CheatFlag::UnrealAccuracyStreak)
}

fn duplicate_fingerprint(s: &Submission<'_>) -> Option<CheatFlag> {
  s.user
    .recent_fingerprints
    .iter()
    .any(|fp| fp == &s.quest.fingerprint)
    .then_some(CheatFlag::DuplicateFingerprint)
}

/// 32-bit `h = h * 31 + unit` over UTF-16 code units, wrapping.
/// Collision-prone on purpose: only ever used as a review signal.
pub fn simple_hash(s: &str) -> i32 {
  s.encode_utf16()
    .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}
