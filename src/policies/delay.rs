//! Delay schedules, indexed by the zero-based number of past retries.
use std::time::Duration;

/// `unit * (n_past_retries + 1)`, saturating at [`Duration::MAX`].
pub fn linear_delay(unit: Duration, n_past_retries: u32) -> Duration {
    unit.checked_mul(n_past_retries.saturating_add(1))
        .unwrap_or(Duration::MAX)
}

/// `base ^ (n_past_retries + 1)`, with `base` taken in seconds, saturating at [`Duration::MAX`].
pub fn exponential_delay(base: Duration, n_past_retries: u32) -> Duration {
    let exponent = i32::try_from(n_past_retries.saturating_add(1)).unwrap_or(i32::MAX);
    Duration::try_from_secs_f64(base.as_secs_f64().powi(exponent)).unwrap_or(Duration::MAX)
}

/// The scheduled delay for this retry; past the end of the schedule, its last entry.
///
/// Returns `None` only for an empty schedule.
pub fn custom_delay(schedule: &[Duration], n_past_retries: u32) -> Option<Duration> {
    usize::try_from(n_past_retries)
        .ok()
        .and_then(|index| schedule.get(index))
        .or_else(|| schedule.last())
        .copied()
}
