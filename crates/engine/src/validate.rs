//! Validation gates.
//!
//! A [`Validator`] is either an external [`Schema`] or an ordered list of
//! [`ValidationRule`]s. Data that passes is returned unchanged.

use async_trait::async_trait;
use kairo_core::constants::OP_VALIDATE;
use kairo_core::unwind::{capture, capture_async};
use kairo_core::{Operation, PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a [`Schema`]
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct SchemaError {
    pub message: String,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl SchemaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }
}

/// External schema that can check (and normalise) data
#[async_trait]
pub trait Schema<T>: Send + Sync {
    async fn parse(&self, data: T) -> std::result::Result<T, SchemaError>;
}

/// Message reported when a rule fails
pub enum RuleMessage<T> {
    Static(String),
    /// Built from the rejected value
    Dynamic(Arc<dyn Fn(&T) -> String + Send + Sync>),
}

impl<T> Clone for RuleMessage<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(message) => Self::Static(message.clone()),
            Self::Dynamic(f) => Self::Dynamic(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for RuleMessage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(message) => write!(f, "Static({message:?})"),
            Self::Dynamic(_) => write!(f, "Dynamic(<fn>)"),
        }
    }
}

impl<T> From<&str> for RuleMessage<T> {
    fn from(message: &str) -> Self {
        Self::Static(message.to_string())
    }
}

impl<T> From<String> for RuleMessage<T> {
    fn from(message: String) -> Self {
        Self::Static(message)
    }
}

/// A named check over a value
pub struct ValidationRule<T> {
    name: String,
    check: Operation<T, bool>,
    message: RuleMessage<T>,
}

impl<T> Clone for ValidationRule<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            check: self.check.clone(),
            message: self.message.clone(),
        }
    }
}

impl<T> fmt::Debug for ValidationRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish()
    }
}

impl<T> ValidationRule<T>
where
    T: Send + 'static,
{
    /// Rule backed by a synchronous predicate
    pub fn new<F>(name: impl Into<String>, predicate: F, message: impl Into<RuleMessage<T>>) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::from_operation(
            name,
            Operation::sync(move |value: T| predicate(&value)),
            message,
        )
    }

    /// Rule backed by any operation shape, including async ones
    pub fn from_operation(
        name: impl Into<String>,
        check: Operation<T, bool>,
        message: impl Into<RuleMessage<T>>,
    ) -> Self {
        Self {
            name: name.into(),
            check,
            message: message.into(),
        }
    }

    /// Replace the message with one built from the rejected value
    #[must_use]
    pub fn with_message_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.message = RuleMessage::Dynamic(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn resolve_message(&self, value: &T) -> String {
        match &self.message {
            RuleMessage::Static(message) => message.clone(),
            RuleMessage::Dynamic(f) => capture(OP_VALIDATE, || f(value))
                .unwrap_or_else(|_| format!("rule '{}' failed", self.name)),
        }
    }
}

/// What data is validated against
pub enum Validator<T> {
    Schema(Arc<dyn Schema<T>>),
    Rules(Vec<ValidationRule<T>>),
}

impl<T> Clone for Validator<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Schema(schema) => Self::Schema(Arc::clone(schema)),
            Self::Rules(rules) => Self::Rules(rules.clone()),
        }
    }
}

impl<T> fmt::Debug for Validator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(_) => write!(f, "Validator::Schema(<schema>)"),
            Self::Rules(rules) => f.debug_tuple("Validator::Rules").field(rules).finish(),
        }
    }
}

impl<T> From<Vec<ValidationRule<T>>> for Validator<T> {
    fn from(rules: Vec<ValidationRule<T>>) -> Self {
        Self::Rules(rules)
    }
}

/// Options for [`validate`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Stop at the first failing rule instead of collecting every failure
    pub stop_on_first: bool,
    /// Accepted for compatibility; has no effect
    pub coerce: bool,
    /// Accepted for compatibility; has no effect
    pub strict: bool,
}

/// A failed rule as reported in error context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule: String,
    pub message: String,
}

/// Admit or reject `data`.
///
/// In rule mode success requires zero failing rules; the error's `failures`
/// context lists each failing rule with its resolved message. A rule whose
/// check itself fails counts as failing.
pub async fn validate<T>(data: T, validator: &Validator<T>, options: &ValidateOptions) -> Result<T>
where
    T: Clone + Send + 'static,
{
    if options.coerce || options.strict {
        tracing::debug!(
            coerce = options.coerce,
            strict = options.strict,
            "validate options coerce/strict have no effect"
        );
    }

    match validator {
        Validator::Schema(schema) => validate_schema(data, schema.as_ref()).await,
        Validator::Rules(rules) => validate_rules(data, rules, options.stop_on_first).await,
    }
}

async fn validate_schema<T>(data: T, schema: &dyn Schema<T>) -> Result<T>
where
    T: Send + 'static,
{
    capture_async(OP_VALIDATE, schema.parse(data))
        .await?
        .map_err(|error| {
            PipelineError::new(OP_VALIDATE, error.message)
                .with_context("schema_issues", error.issues)
        })
}

async fn validate_rules<T>(data: T, rules: &[ValidationRule<T>], stop_on_first: bool) -> Result<T>
where
    T: Clone + Send + 'static,
{
    let mut failures = Vec::new();

    for rule in rules {
        let message = match rule.check.invoke(data.clone()).await {
            Ok(true) => continue,
            Ok(false) => rule.resolve_message(&data),
            Err(error) => format!("{} ({})", rule.resolve_message(&data), error.message),
        };
        tracing::debug!(rule = %rule.name, message = %message, "Validation rule failed");
        failures.push(RuleFailure {
            rule: rule.name.clone(),
            message,
        });

        if stop_on_first {
            break;
        }
    }

    if failures.is_empty() {
        return Ok(data);
    }

    let names: Vec<&str> = failures.iter().map(|f| f.rule.as_str()).collect();
    Err(PipelineError::new(
        OP_VALIDATE,
        format!("Validation failed: {}", names.join(", ")),
    )
    .with_context("failed_rules", &names)
    .with_context("failures", &failures))
}
