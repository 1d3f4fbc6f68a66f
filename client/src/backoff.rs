use rand::{Rng, RngCore};
use std::time::Duration;

/// Delay before retry `attempt` (0-based), doubling from `initial` and
/// capped at `max`.
pub(crate) fn exponential_backoff(initial: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
    initial.saturating_mul(factor).min(max)
}

/// "Equal jitter": the delay is drawn from `[backoff/2, backoff]`.
pub(crate) fn jittered_backoff(rng: &mut impl RngCore, backoff: Duration) -> Duration {
    let backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
    if backoff_ms <= 1 {
        return backoff;
    }

    let half_ms = backoff_ms / 2;
    let jitter_ms = rng.gen_range(0..=half_ms);
    Duration::from_millis(half_ms.saturating_add(jitter_ms))
}
