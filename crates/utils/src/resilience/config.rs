//! Retry policy options.

use kairo_config::{Backoff, RetrySettings};
use kairo_core::PipelineError;
use std::sync::Arc;
use std::time::Duration;

type RetryHook = Arc<dyn Fn(u32, &PipelineError) + Send + Sync>;

/// Which errors should trigger another attempt
#[derive(Clone, Default)]
pub enum RetryOn {
    /// Retry every error
    #[default]
    All,
    /// Retry only errors whose `operation` tag is in the list
    Operations(Vec<String>),
    /// Custom retry predicate
    Custom(Arc<dyn Fn(&PipelineError) -> bool + Send + Sync>),
}

impl std::fmt::Debug for RetryOn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryOn::All => write!(f, "RetryOn::All"),
            RetryOn::Operations(ops) => write!(f, "RetryOn::Operations({ops:?})"),
            RetryOn::Custom(_) => write!(f, "RetryOn::Custom(<predicate>)"),
        }
    }
}

/// Options for [`retry`](super::retry)
#[derive(Clone)]
pub struct RetryOptions {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay between attempts
    pub delay: Duration,
    pub backoff: Backoff,
    /// Upper bound on a single delay
    pub max_delay: Duration,
    /// Randomisation applied to each delay (0.0 to 1.0)
    pub jitter_factor: f64,
    pub retry_on: RetryOn,
    on_retry: Option<RetryHook>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl std::fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .field("backoff", &self.backoff)
            .field("max_delay", &self.max_delay)
            .field("jitter_factor", &self.jitter_factor)
            .field("retry_on", &self.retry_on)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryOptions {
    /// Default policy with the given attempt budget
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Seed options from loaded engine configuration
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            delay: settings.delay(),
            backoff: settings.backoff,
            max_delay: settings.max_delay(),
            jitter_factor: settings.jitter_factor,
            retry_on: RetryOn::All,
            on_retry: None,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Only retry errors accepted by the predicate
    #[must_use]
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PipelineError) -> bool + Send + Sync + 'static,
    {
        self.retry_on = RetryOn::Custom(Arc::new(predicate));
        self
    }

    /// Called with the failed attempt number before each retry
    #[must_use]
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(u32, &PipelineError) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Check if an error should be retried
    pub fn should_retry(&self, error: &PipelineError) -> bool {
        match &self.retry_on {
            RetryOn::All => true,
            RetryOn::Operations(ops) => ops.iter().any(|op| op == &error.operation),
            RetryOn::Custom(predicate) => predicate(error),
        }
    }

    /// Delay after failed attempt `attempt` (1-indexed), capped and jittered
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped = self
            .backoff
            .delay_for(self.delay, attempt)
            .min(self.max_delay);

        if self.jitter_factor > 0.0 {
            let spread = (fastrand::f64() * 2.0 - 1.0) * self.jitter_factor;
            capped.mul_f64((1.0 + spread).max(0.0))
        } else {
            capped
        }
    }

    pub(crate) fn notify_retry(&self, attempt: u32, error: &PipelineError) {
        if let Some(hook) = &self.on_retry {
            hook(attempt, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_capped() {
        let options = RetryOptions::new(10)
            .with_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(250));

        assert_eq!(options.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(options.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(options.delay_for_attempt(3), Duration::from_millis(250));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let options = RetryOptions::new(3)
            .with_backoff(Backoff::Fixed)
            .with_delay(Duration::from_millis(400))
            .with_jitter(0.5);

        for _ in 0..20 {
            let delay = options.delay_for_attempt(2);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(600));
        }
    }

    #[test]
    fn test_retry_on_operations() {
        let options = RetryOptions::default()
            .with_retry_on(RetryOn::Operations(vec!["fetch".to_string()]));
        assert!(options.should_retry(&PipelineError::new("fetch", "503")));
        assert!(!options.should_retry(&PipelineError::new("parse", "bad")));
    }

    #[test]
    fn test_from_settings() {
        let settings = RetrySettings {
            max_attempts: 7,
            delay_ms: 20,
            backoff: Backoff::Linear,
            ..RetrySettings::default()
        };
        let options = RetryOptions::from_settings(&settings);
        assert_eq!(options.max_attempts, 7);
        assert_eq!(options.delay, Duration::from_millis(20));
        assert_eq!(options.backoff, Backoff::Linear);
        assert!(format!("{options:?}").contains("max_attempts: 7"));
    }
}
