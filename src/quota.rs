//! Daily quest quota: a free bucket and an ad-refill bucket, both reset on UTC day rollover.
//!
//! All functions mutate the `User` in place; the caller persists it while holding
//! the user's serialization lock.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::User;

#[derive(Clone, Debug, Deserialize)]
pub struct QuotaConfig {
  #[serde(default = "default_limit")] pub daily_free_limit: u32,
  #[serde(default = "default_limit")] pub daily_ad_limit: u32,
  /// Give the slot back when generation fails after it was charged.
  #[serde(default)] pub refund_on_generation_failure: bool,
}
fn default_limit() -> u32 { 5 }

impl Default for QuotaConfig {
  fn default() -> Self {
    Self { daily_free_limit: 5, daily_ad_limit: 5, refund_on_generation_failure: false }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuotaBucket {
  Free,
  Ad,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuotaDecision {
  /// One slot was taken from the given bucket.
  Charged(QuotaBucket),
  /// Subscribers are not metered.
  Unmetered,
  Denied(&'static str),
}

pub const DAILY_LIMIT_REACHED: &str = "daily limit reached";
pub const AD_LIMIT_REACHED: &str = "ad refill limit reached";

/// Reset both counters when `now` falls on a later UTC date than the last reset.
/// Returns true when a reset happened.
pub fn apply_day_rollover(user: &mut User, now: DateTime<Utc>) -> bool {
  // A missing reset stamp is always stale.
  if let Some(last) = user.quota_reset_at {
    if last.date_naive() == now.date_naive() {
      return false;
    }
  }
  user.daily_free_used = 0;
  user.daily_ad_used = 0;
  user.quota_reset_at = Some(now);
  true
}

pub fn authorize_and_consume(cfg: &QuotaConfig, user: &mut User, now: DateTime<Utc>) -> QuotaDecision {
  apply_day_rollover(user, now);

  if user.is_subscribed() {
    return QuotaDecision::Unmetered;
  }
  if user.daily_free_used < cfg.daily_free_limit {
    user.daily_free_used += 1;
    return QuotaDecision::Charged(QuotaBucket::Free);
  }
  if user.daily_ad_used < cfg.daily_ad_limit {
    user.daily_ad_used += 1;
    return QuotaDecision::Charged(QuotaBucket::Ad);
  }
  QuotaDecision::Denied(DAILY_LIMIT_REACHED)
}

/// Undo a charge. Only valid on the same UTC day as the charge.
pub fn refund(user: &mut User, bucket: QuotaBucket, now: DateTime<Utc>) {
  if apply_day_rollover(user, now) {
    return;
  }
  match bucket {
    QuotaBucket::Free => user.daily_free_used = user.daily_free_used.saturating_sub(1),
    QuotaBucket::Ad => user.daily_ad_used = user.daily_ad_used.saturating_sub(1),
  }
}

/// "Watch an ad": take one ad slot regardless of the free bucket.
/// Returns the remaining ad capacity.
pub fn refill_via_ad(cfg: &QuotaConfig, user: &mut User, now: DateTime<Utc>) -> Result<u32, &'static str> {
  apply_day_rollover(user, now);
  if user.daily_ad_used >= cfg.daily_ad_limit {
    return Err(AD_LIMIT_REACHED);
  }
  user.daily_ad_used += 1;
  Ok(cfg.daily_ad_limit - user.daily_ad_used)
}

pub fn subscription_status(user: &User) -> bool {
  user.is_subscribed()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
  }

  #[test]
  fn free_bucket_first_then_ad_then_denied() {
    let cfg = QuotaConfig::default();
    let mut u = User::new("u1");
    let now = at(2025, 3, 1, 9);

    for n in 1..=12u32 {
      let d = authorize_and_consume(&cfg, &mut u, now);
      match n {
        1..=5 => assert_eq!(d, QuotaDecision::Charged(QuotaBucket::Free)),
        6..=10 => assert_eq!(d, QuotaDecision::Charged(QuotaBucket::Ad)),
        _ => assert_eq!(d, QuotaDecision::Denied(DAILY_LIMIT_REACHED)),
      }
      assert_eq!(u.daily_free_used + u.daily_ad_used, n.min(10));
    }
    assert_eq!((u.daily_free_used, u.daily_ad_used), (5, 5));
  }

  #[test]
  fn next_utc_day_resets_before_consuming() {
    let cfg = QuotaConfig::default();
    let mut u = User::new("u1");
    for _ in 0..10 {
      authorize_and_consume(&cfg, &mut u, at(2025, 3, 1, 23));
    }
    assert_eq!(authorize_and_consume(&cfg, &mut u, at(2025, 3, 1, 23)), QuotaDecision::Denied(DAILY_LIMIT_REACHED));

    let next = at(2025, 3, 2, 0);
    assert_eq!(authorize_and_consume(&cfg, &mut u, next), QuotaDecision::Charged(QuotaBucket::Free));
    assert_eq!((u.daily_free_used, u.daily_ad_used), (1, 0));
    assert_eq!(u.quota_reset_at, Some(next));
  }

  #[test]
  fn rollover_is_idempotent_within_a_day() {
    let mut u = User::new("u1");
    let morning = at(2025, 3, 1, 8);
    assert!(apply_day_rollover(&mut u, morning));
    u.daily_free_used = 3;
    assert!(!apply_day_rollover(&mut u, at(2025, 3, 1, 20)));
    assert_eq!(u.daily_free_used, 3);
    assert_eq!(u.quota_reset_at, Some(morning));
  }

  #[test]
  fn subscribers_bypass_limits_without_counting() {
    let cfg = QuotaConfig::default();
    let mut u = User::new("u1");
    u.subscription.active = true;
    for _ in 0..25 {
      assert_eq!(authorize_and_consume(&cfg, &mut u, at(2025, 3, 1, 9)), QuotaDecision::Unmetered);
    }
    assert_eq!((u.daily_free_used, u.daily_ad_used), (0, 0));
    assert!(subscription_status(&u));
  }

  #[test]
  fn refill_only_touches_ad_bucket() {
    let cfg = QuotaConfig::default();
    let mut u = User::new("u1");
    let now = at(2025, 3, 1, 9);
    assert_eq!(refill_via_ad(&cfg, &mut u, now), Ok(4));
    assert_eq!((u.daily_free_used, u.daily_ad_used), (0, 1));
    for _ in 0..4 {
      refill_via_ad(&cfg, &mut u, now).unwrap();
    }
    assert_eq!(refill_via_ad(&cfg, &mut u, now), Err(AD_LIMIT_REACHED));
    // a new day gives the ad bucket back
    assert_eq!(refill_via_ad(&cfg, &mut u, at(2025, 3, 2, 1)), Ok(4));
  }

  #[test]
  fn refund_returns_slot_same_day_only() {
    let cfg = QuotaConfig::default();
    let mut u = User::new("u1");
    let now = at(2025, 3, 1, 9);
    authorize_and_consume(&cfg, &mut u, now);
    refund(&mut u, QuotaBucket::Free, now);
    assert_eq!(u.daily_free_used, 0);

    authorize_and_consume(&cfg, &mut u, now);
    refund(&mut u, QuotaBucket::Free, at(2025, 3, 2, 9));
    assert_eq!(u.daily_free_used, 0);
    assert_eq!(u.quota_reset_at, Some(at(2025, 3, 2, 9)));
  }
}
