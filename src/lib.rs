//! Automatic retries for task executions.
//!
//! A [`policies::RetryConfiguration`] decides which task failures are retried and after what
//! delay; [`invoke`] and [`RetryingTask`] apply it around a task body and hand retryable
//! failures to the host framework's [`Reschedule`] primitive.
mod error_kind;
pub mod policies;
mod retry_policy;
mod task;

pub use error_kind::{Classification, ErrorKind, ErrorKinds};
pub use retry_policy::{Jitter, RetryDecision, RetryPolicy};
pub use task::{invoke, InvocationContext, Outcome, Reschedule, RetryRequest, RetryingTask, Task};
