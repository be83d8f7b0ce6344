// src/transport/reconnect.rs

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with full jitter for dial retries.
///
/// The n-th delay is drawn uniformly from `[1ms, min(cap, base * 2^n)]`.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
  base: Duration,
  cap: Duration,
  attempt: u32,
}

impl Backoff {
  pub fn new(base: Duration, cap: Duration) -> Self {
    let base = if base.is_zero() { Duration::from_millis(1) } else { base };
    Self {
      base,
      cap: cap.max(base),
      attempt: 0,
    }
  }

  /// Upper bound of the next delay, without jitter.
  pub fn ceiling(&self) -> Duration {
    let factor = 1u32.checked_shl(self.attempt.min(31)).unwrap_or(u32::MAX);
    self.base.saturating_mul(factor).min(self.cap)
  }

  pub fn next_delay(&mut self) -> Duration {
    let ceiling = self.ceiling();
    self.attempt = self.attempt.saturating_add(1);
    let ceiling_ms = ceiling.as_millis().max(1) as u64;
    Duration::from_millis(rand::rng().random_range(1..=ceiling_ms))
  }

  /// Called once a connection succeeds.
  pub fn reset(&mut self) {
    self.attempt = 0;
  }
}
