mod auto_retry;
pub mod delay;

pub use auto_retry::{RetryConfiguration, RetryConfigurationBuilder};
