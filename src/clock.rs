//! Time source injected into the cache and the session engine.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// Settable clock for tests.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
  now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
  pub fn at(rfc3339: &str) -> Self {
    let now = DateTime::parse_from_rfc3339(rfc3339)
      .expect("valid rfc3339 timestamp")
      .with_timezone(&Utc);
    Self { now: std::sync::Mutex::new(now) }
  }

  pub fn advance(&self, by: chrono::Duration) {
    let mut now = self.now.lock().expect("clock lock");
    *now = *now + by;
  }
}

#[cfg(test)]
impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> { *self.now.lock().expect("clock lock") }
}
