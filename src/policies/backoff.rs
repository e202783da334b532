//! # Delay between recovery attempts.
//!
//! [`BackoffPolicy`] decides how long the watchdog waits before restarting a
//! failed critical unit again. The delay for attempt `n` is
//! `first × factor^n`, clamped to `max`, then jittered. The base delay depends
//! only on `n`, so jitter never compounds across attempts.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use servicevisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(250),
//!     max: Duration::from_secs(5),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(250));
//! assert_eq!(backoff.next(2), Duration::from_secs(1));
//! assert_eq!(backoff.next(10), Duration::from_secs(5));
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::policies::jitter::JitterPolicy;

/// Exponential backoff with a cap.
///
/// Deserializes from e.g. `{ first = "500ms", max = "30s", factor = 2.0, jitter = "equal" }`;
/// missing fields take their defaults.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub first: Duration,
    /// Upper bound for any delay.
    #[serde(with = "humantime_serde")]
    pub max: Duration,
    /// Growth factor per attempt (`>= 1.0`).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 1s`, `factor = 2.0`, `max = 60s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Delay before attempt `attempt` (0-indexed).
    ///
    /// Non-finite or out-of-range intermediate values clamp to [`BackoffPolicy::max`].
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }

    /// True if the parameters produce meaningful delays.
    pub(crate) fn is_valid(&self) -> bool {
        self.factor.is_finite() && self.factor >= 1.0 && !self.max.is_zero()
    }
}
