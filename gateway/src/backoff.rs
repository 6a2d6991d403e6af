//! Backoff schedule
//!
//! Delay before retry n+1 is `initial * 2^n`, capped at the policy maximum,
//! unless the server told us how long the model needs.

use std::time::Duration;

use crate::policy::RetryPolicy;

/// Ceiling for server-provided delay hints
pub const MAX_SUGGESTED_DELAY: Duration = Duration::from_millis(60_000);

/// Computed exponential delay after the failed attempt with zero-based index
/// `attempt`. Saturates instead of overflowing for large attempt counts.
pub fn exponential_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay_ms = policy
        .initial_delay_ms
        .saturating_mul(factor)
        .min(policy.max_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Where the next delay came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelaySource {
    /// Server estimate (e.g. `estimated_time`, `Retry-After`)
    ServerHint,
    Exponential,
}

/// Pick the next delay: a usable server hint wins, otherwise exponential.
pub fn next_delay(
    policy: &RetryPolicy,
    attempt: u32,
    suggested: Option<Duration>,
) -> (Duration, DelaySource) {
    match suggested {
        Some(hint) if !hint.is_zero() => (hint.min(MAX_SUGGESTED_DELAY), DelaySource::ServerHint),
        _ => (exponential_delay(policy, attempt), DelaySource::Exponential),
    }
}
