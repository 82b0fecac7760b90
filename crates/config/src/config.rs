//! Engine configuration values and their defaults

use kairo_core::constants::DEFAULT_BATCH_SIZE;
use kairo_core::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub(crate) const OP_CONFIG: &str = "config";

/// Default number of attempts made by `retry`
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay between attempts (100ms)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;
/// Default cap on a single backoff delay (10s)
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Engine-wide defaults.
///
/// Engine option structs can be seeded from this with their
/// `from_config` constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Items processed together in concurrent elementwise mode
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Thunks started together by `parallel`; `None` runs them all at once
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Retry policy
    #[serde(default)]
    pub retry: RetrySettings,

    /// Bound on memoization caches; `None` keeps every entry
    #[serde(default)]
    pub memoize_capacity: Option<usize>,

    /// Accumulator snapshot interval for `reduce`
    #[serde(default)]
    pub checkpoint_interval: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrency: None,
            retry: RetrySettings::default(),
            memoize_capacity: None,
            checkpoint_interval: None,
        }
    }
}

impl EngineConfig {
    /// Reject values that would make an operation unable to progress
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be greater than zero"));
        }
        if self.max_concurrency == Some(0) {
            return Err(invalid("max_concurrency", "must be greater than zero"));
        }
        if self.memoize_capacity == Some(0) {
            return Err(invalid("memoize_capacity", "must be greater than zero"));
        }
        if self.checkpoint_interval == Some(0) {
            return Err(invalid("checkpoint_interval", "must be greater than zero"));
        }
        self.retry.validate()
    }
}

/// Retry policy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// How the delay grows between attempts
    #[serde(default)]
    pub backoff: Backoff,

    /// Upper bound on a single delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Randomisation applied to each delay (0.0 to 1.0)
    #[serde(default)]
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
            backoff: Backoff::default(),
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: 0.0,
        }
    }
}

impl RetrySettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(invalid("retry.jitter_factor", "must be between 0.0 and 1.0"));
        }
        Ok(())
    }
}

/// Delay growth strategy between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// delay * attempt
    Linear,
    /// delay * 2^(attempt - 1)
    #[default]
    Exponential,
}

impl Backoff {
    /// Delay before the retry that follows failed attempt `attempt` (1-indexed), uncapped
    pub fn delay_for(self, base: Duration, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self {
            Backoff::Fixed => base,
            Backoff::Linear => base.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 2u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
                base.saturating_mul(factor)
            }
        }
    }
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backoff::Fixed => "fixed",
            Backoff::Linear => "linear",
            Backoff::Exponential => "exponential",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Backoff {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" | "constant" => Ok(Backoff::Fixed),
            "linear" => Ok(Backoff::Linear),
            "exponential" => Ok(Backoff::Exponential),
            other => Err(invalid(
                "retry.backoff",
                format!("unknown strategy '{other}' (expected fixed, linear or exponential)"),
            )),
        }
    }
}

pub(crate) fn invalid(field: &str, message: impl fmt::Display) -> PipelineError {
    PipelineError::new(OP_CONFIG, format!("invalid value for '{field}': {message}"))
        .with_context("field", field)
}

// Default value functions for serde
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
