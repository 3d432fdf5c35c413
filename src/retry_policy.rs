use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// A policy for deciding whether and when to retry a failed task.
pub trait RetryPolicy {
    /// Determine if a task that failed with `error` should be retried, given how many
    /// retries were already attempted.
    fn should_retry(&self, error: &anyhow::Error, n_past_retries: u32) -> RetryDecision;
}

/// Outcome of evaluating a retry policy for a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reschedule the task `countdown` from now, i.e. at `execute_after`.
    Retry {
        countdown: Duration,
        execute_after: DateTime<Utc>,
    },
    /// Give up and surface the error.
    DoNotRetry,
}

impl RetryDecision {
    /// A retry decision for a task to run again `countdown` from now.
    pub fn retry_after(countdown: Duration) -> Self {
        RetryDecision::Retry {
            countdown,
            execute_after: eta(countdown),
        }
    }
}

/// How to apply jitter to the computed retry delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Jitter {
    /// Don't apply any jitter.
    #[default]
    None,
    /// Jitter between 0 and the computed delay.
    Full,
    /// Jitter between 50% of the computed delay and the computed delay.
    Bounded,
}

impl Jitter {
    pub(crate) fn apply(&self, delay: Duration) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Full => {
                let jitter_factor: f64 = rand::rng().random_range(0.0..1.0);

                scale(delay, jitter_factor)
            }
            Jitter::Bounded => {
                /// The lower bound for the jittered delay, as a fraction of the computed delay.
                const MIN_BOUND_FRACTION: f64 = 0.5;

                let jitter_factor: f64 = rand::rng().random_range(0.0..1.0);
                let floor = scale(delay, MIN_BOUND_FRACTION);

                floor + scale(delay - floor, jitter_factor)
            }
        }
    }
}

/// `delay * factor` for a factor in `[0, 1]`, never rounding past `delay` itself.
fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
        .map_or(delay, |scaled| scaled.min(delay))
}

/// Wall-clock instant `countdown` from now, clamped to the latest representable timestamp.
fn eta(countdown: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(countdown)
        .ok()
        .and_then(|countdown| Utc::now().checked_add_signed(countdown))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
