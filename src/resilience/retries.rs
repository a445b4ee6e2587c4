//! Retry logic for origin connection establishment.
//!
//! # Responsibilities
//! - Decide whether a transport failure is worth another attempt
//! - Space attempts with exponential backoff + jitter
//!
//! # Design Decisions
//! - Only name resolution and TCP connect are retried; nothing has been sent yet
//! - Handshake, write and read failures are final for the request
//! - Jittered backoff prevents thundering herd

use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::resilience::backoff::calculate_backoff;
use crate::upstream::TransportError;

/// How many times, and how far apart, to try reaching the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether another attempt may follow failed attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32, error: &TransportError) -> bool {
        attempt < self.max_attempts && is_retryable(error)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay, self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&UpstreamConfig::default())
    }
}

/// Failures that happen before any request byte reached the origin.
pub fn is_retryable(error: &TransportError) -> bool {
    matches!(error, TransportError::Dns { .. } | TransportError::Connect { .. })
}
