//! Recovery timing policies.
//!
//! Used by the watchdog to space out restarts of failed critical units.
//!
//! ## Contents
//! - [`BackoffPolicy`] how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized restarts
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=1s, factor=2.0, max=60s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
