//! Running task bodies under a [`RetryPolicy`].
//!
//! The host framework owns the queue and the retry counter. It hands each attempt an
//! [`InvocationContext`] and exposes its re-queue primitive through [`Reschedule`].
use crate::{RetryDecision, RetryPolicy};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A unit of work the host framework can run.
pub trait Task {
    type Args;
    type Output;

    fn run(&self, args: Self::Args) -> anyhow::Result<Self::Output>;
}

/// Per-attempt data supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext<A> {
    /// Number of retries already attempted for this logical task.
    pub retries: u32,
    /// Payload for the task body, passed through unchanged.
    pub args: A,
}

impl<A> InvocationContext<A> {
    /// Context for the first attempt.
    pub fn new(args: A) -> Self {
        Self { retries: 0, args }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// A request to run the failed task again later.
#[derive(Debug)]
pub struct RetryRequest {
    /// The error that triggered the retry.
    pub error: anyhow::Error,
    pub countdown: Duration,
    pub execute_after: DateTime<Utc>,
    /// Retries attempted before this one. The host increments it for the next attempt.
    pub retries: u32,
}

/// The host framework's re-queue primitive.
pub trait Reschedule {
    /// Re-queue the task. An error returned here reaches the caller of [`invoke`] unchanged.
    fn reschedule(&self, request: RetryRequest) -> anyhow::Result<()>;
}

/// What a single attempt amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The task body succeeded.
    Completed(T),
    /// The task body failed and the host accepted a retry.
    Rescheduled {
        countdown: Duration,
        execute_after: DateTime<Utc>,
    },
}

impl<T> Outcome<T> {
    /// The task's value, if it completed.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Rescheduled { .. } => None,
        }
    }
}

/// Runs `body` once and lets `policy` decide what happens to a failure.
///
/// Errors the policy does not retry are returned as-is. Retryable errors are handed to
/// `host` along with the delay; whatever `host` returns is passed back.
pub fn invoke<A, T, P, H, F>(
    policy: &P,
    host: &H,
    context: InvocationContext<A>,
    body: F,
) -> anyhow::Result<Outcome<T>>
where
    P: RetryPolicy + ?Sized,
    H: Reschedule + ?Sized,
    F: FnOnce(A) -> anyhow::Result<T>,
{
    let InvocationContext { retries, args } = context;

    let error = match body(args) {
        Ok(value) => return Ok(Outcome::Completed(value)),
        Err(error) => error,
    };

    match policy.should_retry(&error, retries) {
        RetryDecision::DoNotRetry => {
            tracing::debug!(retries, error = %error, "Task failed, not retrying.");
            Err(error)
        }
        RetryDecision::Retry {
            countdown,
            execute_after,
        } => {
            tracing::warn!(
                retries,
                ?countdown,
                %execute_after,
                error = %error,
                "Task failed, rescheduling."
            );
            host.reschedule(RetryRequest {
                error,
                countdown,
                execute_after,
                retries,
            })?;
            Ok(Outcome::Rescheduled {
                countdown,
                execute_after,
            })
        }
    }
}

/// A [`Task`] decorated with a retry policy.
///
/// # Example
///
/// ```
/// use task_autoretry::policies::RetryConfiguration;
/// use task_autoretry::{InvocationContext, Outcome, Reschedule, RetryRequest, RetryingTask, Task};
/// use std::time::Duration;
///
/// struct Divide;
///
/// impl Task for Divide {
///     type Args = (u32, u32);
///     type Output = u32;
///
///     fn run(&self, (a, b): (u32, u32)) -> anyhow::Result<u32> {
///         a.checked_div(b).ok_or_else(|| anyhow::anyhow!("division by zero"))
///     }
/// }
///
/// struct Queue;
///
/// impl Reschedule for Queue {
///     fn reschedule(&self, _request: RetryRequest) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
///
/// let task = RetryingTask::new(
///     Divide,
///     RetryConfiguration::builder()
///         .autoretry(true)
///         .constant_delay(Duration::from_secs(2))
///         .build(),
/// );
///
/// let outcome = task.call(&Queue, InvocationContext::new((6, 3))).unwrap();
/// assert_eq!(outcome, Outcome::Completed(2));
///
/// let outcome = task.call(&Queue, InvocationContext::new((6, 0))).unwrap();
/// assert!(matches!(outcome, Outcome::Rescheduled { countdown, .. } if countdown == Duration::from_secs(2)));
/// ```
#[derive(Debug, Clone)]
pub struct RetryingTask<T, P> {
    task: T,
    policy: P,
}

impl<T, P> RetryingTask<T, P>
where
    T: Task,
    P: RetryPolicy,
{
    pub fn new(task: T, policy: P) -> Self {
        Self { task, policy }
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Per-instance override of the policy.
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Runs one attempt of the task. See [`invoke`].
    pub fn call<H>(
        &self,
        host: &H,
        context: InvocationContext<T::Args>,
    ) -> anyhow::Result<Outcome<T::Output>>
    where
        H: Reschedule + ?Sized,
    {
        invoke(&self.policy, host, context, |args| self.task.run(args))
    }
}
