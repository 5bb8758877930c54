use std::time::Duration;

use parley_types::config::ReconnectPolicy;

/// Delay before reconnect attempt number `attempt` (1-based).
///
/// Returns `None` once the policy's attempt budget is exhausted.
pub fn backoff_delay(policy: &ReconnectPolicy, attempt: u32) -> Option<Duration> {
    if let Some(max) = policy.max_attempts {
        if attempt > max {
            return None;
        }
    }
    let exponent = attempt.saturating_sub(1).min(32) as i32;
    let factor = policy.multiplier.max(1.0).powi(exponent);
    let millis = (policy.initial_delay_ms as f64 * factor).min(policy.max_delay_ms as f64);
    Some(Duration::from_millis(millis as u64))
}
