//! Answer grading: exact match after normalization, graded partial credit for close answers.
//!
//! Similarity is `1 - levenshtein / max_len` over chars of the normalized strings.
//! Below `SIMILARITY_THRESHOLD` the answer earns nothing.

use crate::util::normalize_answer;

pub const SIMILARITY_THRESHOLD: f64 = 0.7;
pub const SOLVE_THRESHOLD: u8 = 70;

/// Score a submission in 0..=100.
pub fn score(correct_answer: &str, user_answer: Option<&str>) -> u8 {
  let user = match user_answer.map(normalize_answer) {
    Some(u) if !u.is_empty() => u,
    _ => return 0,
  };
  let expected = normalize_answer(correct_answer);
  if expected == user {
    return 100;
  }

  let sim = similarity(&expected, &user);
  if sim > SIMILARITY_THRESHOLD {
    (sim * 100.0).round().clamp(0.0, 100.0) as u8
  } else {
    0
  }
}

pub fn is_solved(score: u8) -> bool {
  score >= SOLVE_THRESHOLD
}

/// Similarity ratio in [0, 1]. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
  let max_len = a.chars().count().max(b.chars().count());
  if max_len == 0 {
    return 1.0;
  }
  1.0 - levenshtein(a, b) as f64 / max_len as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
  let b: Vec<char> = b.chars().collect();
  let mut prev: Vec<usize> = (0..=b.len()).collect();
  let mut curr = vec![0; b.len() + 1];

  for (i, ca) in a.chars().enumerate() {
    curr[0] = i + 1;
    for (j, cb) in b.iter().enumerate() {
      let cost = if ca == *cb { 0 } else { 1 };
      curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
    }
    std::mem::swap(&mut prev, &mut curr);
  }
  prev[b.len()]
}
