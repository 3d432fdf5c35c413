use crate::policies::delay::{custom_delay, exponential_delay, linear_delay};
use crate::{Classification, ErrorKind, ErrorKinds, Jitter, RetryDecision, RetryPolicy};
use std::time::Duration;

/// Automatic retry settings attached to a task definition.
///
/// When `autoretry` is off the policy never retries and errors pass through untouched.
/// When on, failures are classified against `only_retry_for` / `prevent_retry_for` and
/// retryable ones are rescheduled after a delay picked from, by precedence:
/// `linear_delay`, `exponential_delay_base`, `custom_delay_schedule`, and finally
/// `constant_delay` or `default_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct RetryConfiguration {
    /// Master switch.
    pub autoretry: bool,
    /// Delay used when no other delay option is set.
    pub default_delay: Duration,
    /// Same delay for every retry.
    pub constant_delay: Option<Duration>,
    /// Delay unit, multiplied by the attempt number.
    pub linear_delay: Option<Duration>,
    /// Base in seconds, raised to the attempt number.
    pub exponential_delay_base: Option<Duration>,
    /// Delay per attempt; the last entry is reused once the schedule runs out.
    pub custom_delay_schedule: Option<Vec<Duration>>,
    /// Allow-list: only these kinds are retried, anything else is propagated.
    pub only_retry_for: Option<ErrorKinds>,
    /// Deny-list: these kinds are propagated, anything else is retried.
    /// Ignored when `only_retry_for` is set.
    pub prevent_retry_for: Option<ErrorKinds>,
    /// Maximum number of retries, after which errors are propagated.
    pub max_retries: Option<u32>,
    /// Jitter applied on top of the selected delay.
    pub jitter: Jitter,
}

impl Default for RetryConfiguration {
    fn default() -> Self {
        Self {
            autoretry: false,
            default_delay: Duration::from_secs(3 * 60),
            constant_delay: None,
            linear_delay: None,
            exponential_delay_base: None,
            custom_delay_schedule: None,
            only_retry_for: None,
            prevent_retry_for: None,
            max_retries: None,
            jitter: Jitter::None,
        }
    }
}

impl RetryConfiguration {
    /// Returns a builder, starting from the default (disabled) configuration.
    ///
    /// # Example
    /// ```
    /// use task_autoretry::policies::RetryConfiguration;
    /// use std::time::Duration;
    ///
    /// let config = RetryConfiguration::builder()
    ///     .autoretry(true)
    ///     .linear_delay(Duration::from_secs(2))
    ///     .prevent_retry_for([task_autoretry::ErrorKind::of::<std::fmt::Error>()])
    ///     .build();
    ///
    /// assert!(config.autoretry);
    /// assert_eq!(config.select_delay(3), Duration::from_secs(8));
    /// ```
    pub fn builder() -> RetryConfigurationBuilder {
        <_>::default()
    }

    /// Splits error kinds into those to retry and those to re-raise.
    ///
    /// The allow-list wins over the deny-list. With neither set, everything is retried.
    pub fn classify_exceptions(&self) -> Classification {
        if let Some(only_retry_for) = &self.only_retry_for {
            Classification {
                retry: only_retry_for.clone(),
                raise: ErrorKinds::none(),
            }
        } else if let Some(prevent_retry_for) = &self.prevent_retry_for {
            Classification {
                retry: ErrorKinds::any(),
                raise: prevent_retry_for.clone(),
            }
        } else {
            Classification::default()
        }
    }

    /// Delay before the next attempt, without jitter.
    pub fn select_delay(&self, n_past_retries: u32) -> Duration {
        let baseline = self.constant_delay.unwrap_or(self.default_delay);

        if let Some(unit) = self.linear_delay {
            linear_delay(unit, n_past_retries)
        } else if let Some(base) = self.exponential_delay_base {
            exponential_delay(base, n_past_retries)
        } else if let Some(schedule) = &self.custom_delay_schedule {
            custom_delay(schedule, n_past_retries).unwrap_or(baseline)
        } else {
            baseline
        }
    }

    fn too_many_attempts(&self, n_past_retries: u32) -> bool {
        self.max_retries
            .is_some_and(|max_n| max_n <= n_past_retries)
    }
}

impl RetryPolicy for RetryConfiguration {
    fn should_retry(&self, error: &anyhow::Error, n_past_retries: u32) -> RetryDecision {
        if !self.autoretry || self.too_many_attempts(n_past_retries) {
            return RetryDecision::DoNotRetry;
        }

        let Classification { retry, raise } = self.classify_exceptions();
        if raise.matches(error) || !retry.matches(error) {
            RetryDecision::DoNotRetry
        } else {
            let countdown = self.jitter.apply(self.select_delay(n_past_retries));
            RetryDecision::retry_after(countdown)
        }
    }
}

/// Builds a [`RetryConfiguration`].
#[derive(Debug, Default)]
pub struct RetryConfigurationBuilder {
    config: RetryConfiguration,
}

impl RetryConfigurationBuilder {
    /// Turn automatic retries on or off. _Default off_.
    pub fn autoretry(mut self, enabled: bool) -> Self {
        self.config.autoretry = enabled;
        self
    }

    /// Fallback delay. _Default 3m_.
    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.config.default_delay = delay;
        self
    }

    pub fn constant_delay(mut self, delay: Duration) -> Self {
        self.config.constant_delay = Some(delay);
        self
    }

    pub fn linear_delay(mut self, unit: Duration) -> Self {
        self.config.linear_delay = Some(unit);
        self
    }

    pub fn exponential_delay_base(mut self, base: Duration) -> Self {
        self.config.exponential_delay_base = Some(base);
        self
    }

    /// Per-attempt delays.
    ///
    /// Panics if `schedule` is empty.
    pub fn custom_delay_schedule(mut self, schedule: impl IntoIterator<Item = Duration>) -> Self {
        let schedule: Vec<_> = schedule.into_iter().collect();
        assert!(
            !schedule.is_empty(),
            "A custom delay schedule needs at least one delay."
        );
        self.config.custom_delay_schedule = Some(schedule);
        self
    }

    /// Only retry errors of these kinds. Takes precedence over [`Self::prevent_retry_for`].
    pub fn only_retry_for(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.config.only_retry_for = Some(kinds.into_iter().collect());
        self
    }

    /// Never retry errors of these kinds.
    pub fn prevent_retry_for(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.config.prevent_retry_for = Some(kinds.into_iter().collect());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = Some(n);
        self
    }

    /// Set what type of jitter to apply. _Default none_.
    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> RetryConfiguration {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Fake;

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct ConnectionReset;

    #[derive(Debug, thiserror::Error)]
    #[error("invalid payload")]
    struct InvalidPayload;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn enabled() -> RetryConfigurationBuilder {
        RetryConfiguration::builder().autoretry(true)
    }

    fn countdown(decision: RetryDecision) -> Duration {
        match decision {
            RetryDecision::Retry { countdown, .. } => countdown,
            RetryDecision::DoNotRetry => panic!("Expected Retry decision."),
        }
    }

    #[test]
    fn defaults_are_disabled_with_three_minute_delay() {
        let config = RetryConfiguration::default();

        assert!(!config.autoretry);
        assert_eq!(config.select_delay(0), secs(180));
        assert_eq!(config.jitter, Jitter::None);
    }

    #[test]
    fn retries_everything_if_no_lists_are_set() {
        let config = RetryConfiguration::default();

        let Classification { retry, raise } = config.classify_exceptions();

        assert_eq!(retry, ErrorKinds::any());
        assert_eq!(raise, ErrorKinds::none());
    }

    #[test]
    fn only_retry_for_overrides_default() {
        let config = enabled()
            .only_retry_for([ErrorKind::of::<ConnectionReset>()])
            .build();

        let Classification { retry, raise } = config.classify_exceptions();

        assert_eq!(retry, ErrorKinds::none().with::<ConnectionReset>());
        assert!(raise.is_empty());
    }

    #[test]
    fn prevent_retry_for_populates_raise_kinds() {
        let config = enabled()
            .prevent_retry_for([ErrorKind::of::<InvalidPayload>()])
            .build();

        let Classification { retry, raise } = config.classify_exceptions();

        assert_eq!(retry, ErrorKinds::any());
        assert_eq!(raise, ErrorKinds::none().with::<InvalidPayload>());
    }

    #[test]
    fn allow_list_takes_precedence_over_deny_list() {
        let config = enabled()
            .only_retry_for([ErrorKind::of::<ConnectionReset>()])
            .prevent_retry_for([ErrorKind::of::<ConnectionReset>()])
            .build();

        let Classification { retry, raise } = config.classify_exceptions();

        assert_eq!(retry, ErrorKinds::none().with::<ConnectionReset>());
        assert!(raise.is_empty());
        assert!(matches!(
            config.should_retry(&anyhow::Error::new(ConnectionReset), 0),
            RetryDecision::Retry { .. }
        ));
    }

    #[test]
    fn constant_delay_overrides_default_delay() {
        let config = enabled()
            .default_delay(secs(1))
            .constant_delay(secs(2))
            .build();
        let n_past_retries: u32 = (0..1_000).fake();

        assert_eq!(config.select_delay(n_past_retries), secs(2));
    }

    #[test]
    fn linear_delay_overrides_default_delay() {
        let config = enabled()
            .default_delay(secs(1))
            .linear_delay(secs(2))
            .build();

        assert_eq!(config.select_delay(0), secs(2));
        assert_eq!(config.select_delay(3), secs(8));
    }

    #[test]
    fn linear_delay_wins_over_every_other_schedule() {
        let config = enabled()
            .constant_delay(secs(7))
            .linear_delay(secs(2))
            .exponential_delay_base(secs(3))
            .custom_delay_schedule([secs(100)])
            .build();

        assert_eq!(config.select_delay(1), secs(4));
    }

    #[test]
    fn exponential_delay_wins_over_custom_schedule() {
        let config = enabled()
            .constant_delay(secs(7))
            .exponential_delay_base(secs(3))
            .custom_delay_schedule([secs(100)])
            .build();

        assert_eq!(config.select_delay(1), secs(9));
    }

    #[test]
    fn custom_schedule_wins_over_constant_delay() {
        let config = enabled()
            .constant_delay(secs(7))
            .custom_delay_schedule([secs(2), secs(5), secs(10), secs(15)])
            .build();

        assert_eq!(config.select_delay(2), secs(10));
        assert_eq!(config.select_delay(7), secs(15));
    }

    #[test]
    fn empty_custom_schedule_falls_back_to_baseline() {
        let mut config = enabled().constant_delay(secs(7)).build();
        config.custom_delay_schedule = Some(Vec::new());

        assert_eq!(config.select_delay(0), secs(7));
    }

    #[test]
    #[should_panic]
    fn builder_rejects_empty_custom_schedule() {
        RetryConfiguration::builder().custom_delay_schedule(Vec::new());
    }

    #[test]
    fn disabled_configuration_never_retries() {
        let config = RetryConfiguration::builder()
            .constant_delay(secs(2))
            .build();
        let n_past_retries: u32 = (0..1_000).fake();

        let decision = config.should_retry(&anyhow::anyhow!("boom"), n_past_retries);

        assert_eq!(decision, RetryDecision::DoNotRetry);
    }

    #[test]
    fn deny_listed_errors_are_not_retried() {
        let config = enabled()
            .prevent_retry_for([ErrorKind::of::<InvalidPayload>()])
            .build();

        assert_eq!(
            config.should_retry(&anyhow::Error::new(InvalidPayload), 0),
            RetryDecision::DoNotRetry
        );
        assert_eq!(
            countdown(config.should_retry(&anyhow::Error::new(ConnectionReset), 0)),
            secs(180)
        );
    }

    #[test]
    fn errors_outside_the_allow_list_are_not_retried() {
        let config = enabled()
            .only_retry_for([ErrorKind::of::<ConnectionReset>()])
            .constant_delay(secs(2))
            .build();

        assert_eq!(
            config.should_retry(&anyhow::Error::new(InvalidPayload), 0),
            RetryDecision::DoNotRetry
        );
        assert_eq!(
            countdown(config.should_retry(&anyhow::Error::new(ConnectionReset), 0)),
            secs(2)
        );
    }

    #[test]
    fn if_n_past_retries_is_below_maximum_it_decides_to_retry() {
        // Arrange
        let config = enabled().max_retries(5).build();
        let n_past_retries = (0..config.max_retries.unwrap()).fake();

        // Act
        let decision = config.should_retry(&anyhow::anyhow!("boom"), n_past_retries);

        // Assert
        assert!(matches!(decision, RetryDecision::Retry { .. }));
    }

    #[test]
    fn if_n_past_retries_is_above_maximum_it_decides_not_to_retry() {
        // Arrange
        let config = enabled().max_retries(5).build();
        let n_past_retries = (config.max_retries.unwrap()..).fake();

        // Act
        let decision = config.should_retry(&anyhow::anyhow!("boom"), n_past_retries);

        // Assert
        assert_eq!(decision, RetryDecision::DoNotRetry);
    }

    #[test]
    fn jitter_is_applied_on_top_of_the_selected_delay() {
        let config = enabled()
            .linear_delay(secs(10))
            .jitter(Jitter::Bounded)
            .build();

        let countdown = countdown(config.should_retry(&anyhow::anyhow!("boom"), 1));

        assert!(countdown >= secs(10));
        assert!(countdown <= secs(20));
    }
}
