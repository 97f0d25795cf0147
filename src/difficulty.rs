//! Adaptive difficulty: one step up on a solve, one step down otherwise, clamped to 1..=10.

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 10;

pub fn clamp_difficulty(d: u8) -> u8 {
  d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// Next difficulty after a graded attempt.
pub fn adjust(current: u8, solved: bool) -> u8 {
  let current = clamp_difficulty(current);
  if solved {
    (current + 1).min(MAX_DIFFICULTY)
  } else {
    current.saturating_sub(1).max(MIN_DIFFICULTY)
  }
}
