//! Loading engine configuration from JSON and the environment
//!
//! Precedence, lowest to highest: built-in defaults, JSON file, `KAIRO_*`
//! environment variables. Every loaded config is validated before it is
//! returned.

use crate::config::{invalid, Backoff, EngineConfig, OP_CONFIG};
use kairo_core::{PipelineError, Result, ResultExt};
use std::path::Path;
use std::str::FromStr;

// Environment variable names
pub const KAIRO_BATCH_SIZE_VAR: &str = "KAIRO_BATCH_SIZE";
pub const KAIRO_MAX_CONCURRENCY_VAR: &str = "KAIRO_MAX_CONCURRENCY";
pub const KAIRO_RETRY_MAX_ATTEMPTS_VAR: &str = "KAIRO_RETRY_MAX_ATTEMPTS";
pub const KAIRO_RETRY_DELAY_MS_VAR: &str = "KAIRO_RETRY_DELAY_MS";
pub const KAIRO_RETRY_BACKOFF_VAR: &str = "KAIRO_RETRY_BACKOFF";
pub const KAIRO_MEMOIZE_CAPACITY_VAR: &str = "KAIRO_MEMOIZE_CAPACITY";

impl EngineConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .with_context(OP_CONFIG, || "failed to parse engine config".to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::new(OP_CONFIG, format!("failed to read config file: {e}"))
                .with_context("path", path.display().to_string())
        })?;
        let mut config = Self::from_json_str(&contents)?;
        config.apply_env_overrides()?;
        tracing::debug!(path = %path.display(), ?config, "loaded engine config");
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `KAIRO_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = parse_var::<usize>(&lookup, KAIRO_BATCH_SIZE_VAR)? {
            self.batch_size = value;
        }
        if let Some(value) = parse_var::<usize>(&lookup, KAIRO_MAX_CONCURRENCY_VAR)? {
            self.max_concurrency = Some(value);
        }
        if let Some(value) = parse_var::<u32>(&lookup, KAIRO_RETRY_MAX_ATTEMPTS_VAR)? {
            self.retry.max_attempts = value;
        }
        if let Some(value) = parse_var::<u64>(&lookup, KAIRO_RETRY_DELAY_MS_VAR)? {
            self.retry.delay_ms = value;
        }
        if let Some(value) = parse_var::<Backoff>(&lookup, KAIRO_RETRY_BACKOFF_VAR)? {
            self.retry.backoff = value;
        }
        if let Some(value) = parse_var::<usize>(&lookup, KAIRO_MEMOIZE_CAPACITY_VAR)? {
            self.memoize_capacity = Some(value);
        }
        self.validate()
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(name, e).with_context("raw", raw)),
    }
}
