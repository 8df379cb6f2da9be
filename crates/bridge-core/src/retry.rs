// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Exponential backoff policy for connection attempts.
//!
//! The delay before attempt `n + 1` is
//! `min(initial_delay * multiplier^(n - 1), max_delay)`, and at most
//! `max_retries` attempts are made.
//!
//! # Example
//!
//! ```
//! use bridge_core::retry::BackoffPolicy;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::default();
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
//! assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(30000));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

// =============================================================================
// BackoffPolicy
// =============================================================================

/// Retry policy for session establishment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Maximum number of connection attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first failed attempt.
    #[serde(default = "default_initial_delay")]
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    #[serde(default = "default_max_delay")]
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,

    /// Growth factor between consecutive delays.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_millis(30_000)
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy from raw millisecond values.
    pub fn from_millis(max_retries: u32, initial_ms: u64, max_ms: u64, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            multiplier,
        }
    }

    /// Returns the delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_millis() as f64);

        if capped.is_finite() && capped >= 0.0 {
            Duration::from_millis(capped as u64)
        } else {
            self.max_delay
        }
    }

    /// Starts a fresh retry sequence.
    pub fn start(&self) -> RetryState {
        RetryState {
            attempt: 0,
            current_delay: self.initial_delay,
            started: Instant::now(),
        }
    }
}

// =============================================================================
// RetryState
// =============================================================================

/// Progress of one connection attempt sequence.
///
/// Local to a single `connect` call; discarded on success or exhaustion.
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Number of attempts made so far.
    pub attempt: u32,
    /// Delay to wait before the next attempt.
    pub current_delay: Duration,
    started: Instant,
}

impl RetryState {
    /// Records a failed attempt and computes the next delay.
    ///
    /// Returns `None` once `max_retries` attempts have been made.
    pub fn record_failure(&mut self, policy: &BackoffPolicy) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= policy.max_retries {
            return None;
        }
        self.current_delay = policy.delay_for_attempt(self.attempt);
        Some(self.current_delay)
    }

    /// Time since the sequence started, on tokio's clock.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// =============================================================================
// Tests
// =============================================================================
