//! Conditional routing and partitioning.
//!
//! [`branch_route`] selects exactly one operation for a value.
//! [`partition_by`] groups many items into named buckets.

use indexmap::IndexMap;
use kairo_core::constants::{DEFAULT_BRANCH, OP_BRANCH, OP_PARTITION};
use kairo_core::unwind::capture;
use kairo_core::{require_items, IntoItems, Operation, PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a branch.
///
/// Boolean classifications map to the keys `"true"` and `"false"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchKey(String);

impl BranchKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<bool> for BranchKey {
    fn from(value: bool) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for BranchKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BranchKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for BranchKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Named operations, kept in insertion order
pub type Branches<I, O = I> = IndexMap<BranchKey, Operation<I, O>>;

/// Build a [`Branches`] map from `(key, operation)` pairs
pub fn branches<I, O, K>(entries: impl IntoIterator<Item = (K, Operation<I, O>)>) -> Branches<I, O>
where
    K: Into<BranchKey>,
{
    entries
        .into_iter()
        .map(|(key, op)| (key.into(), op))
        .collect()
}

/// Options for [`branch_route`]
pub struct BranchOptions<I, O = I> {
    /// Run when no branch matches the key, before the `"default"` entry
    pub fallback: Option<Operation<I, O>>,
}

impl<I, O> Default for BranchOptions<I, O> {
    fn default() -> Self {
        Self { fallback: None }
    }
}

impl<I, O> Clone for BranchOptions<I, O> {
    fn clone(&self) -> Self {
        Self {
            fallback: self.fallback.clone(),
        }
    }
}

impl<I, O> fmt::Debug for BranchOptions<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchOptions")
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl<I, O> BranchOptions<I, O> {
    pub fn with_fallback(fallback: Operation<I, O>) -> Self {
        Self {
            fallback: Some(fallback),
        }
    }
}

/// Classify `data` and run the single matching branch.
///
/// Lookup order is the exact key, then `options.fallback`, then the
/// `"default"` entry. The selected branch's result is returned unchanged.
pub async fn branch_route<I, O, C, K>(
    data: I,
    classify: C,
    branches: &Branches<I, O>,
    options: &BranchOptions<I, O>,
) -> Result<O>
where
    I: Send + 'static,
    O: Send + 'static,
    C: FnOnce(&I) -> K,
    K: Into<BranchKey>,
{
    let key: BranchKey = capture(OP_BRANCH, || classify(&data).into())?;

    let selected = branches
        .get(&key)
        .or(options.fallback.as_ref())
        .or_else(|| branches.get(&BranchKey::from(DEFAULT_BRANCH)));

    match selected {
        Some(op) => {
            tracing::debug!(key = %key, branch = op.name(), "Routing to branch");
            op.invoke(data).await
        }
        None => {
            let available: Vec<&str> = branches.keys().map(BranchKey::as_str).collect();
            Err(PipelineError::new(
                OP_BRANCH,
                format!(
                    "No branch for key '{key}'; available: [{}]",
                    available.join(", ")
                ),
            )
            .with_context("key", &key)
            .with_context("available", available))
        }
    }
}

/// Named predicates, evaluated in insertion order
pub type Predicates<T> = IndexMap<String, Box<dyn Fn(&T) -> bool + Send + Sync>>;

/// Options for [`partition_by`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionOptions {
    /// Put each item only in the first bucket whose predicate it satisfies
    pub exclusive: bool,
    /// Collect items matching no predicate under `"default"`
    pub include_default: bool,
}

/// Bucket items by the predicates they satisfy.
///
/// Every predicate's bucket is present in the output, empty or not, in
/// predicate order. The `"default"` bucket is present iff
/// `include_default` is set. Items keep their relative order in each bucket.
pub fn partition_by<T>(
    input: impl IntoItems<T>,
    predicates: &Predicates<T>,
    options: PartitionOptions,
) -> Result<IndexMap<String, Vec<T>>>
where
    T: Clone + fmt::Debug,
{
    let items = require_items(OP_PARTITION, input)?;

    let mut buckets: IndexMap<String, Vec<T>> = predicates
        .keys()
        .map(|name| (name.clone(), Vec::new()))
        .collect();
    if options.include_default {
        buckets.entry(DEFAULT_BRANCH.to_string()).or_default();
    }

    for (index, item) in items.into_iter().enumerate() {
        let mut matched = false;
        for (name, predicate) in predicates {
            let hit = capture(OP_PARTITION, || predicate(&item)).map_err(|error| {
                error
                    .with_context("index", index)
                    .with_context("bucket", name)
                    .with_debug("item", &item)
            })?;
            if hit {
                matched = true;
                buckets.entry(name.clone()).or_default().push(item.clone());
                if options.exclusive {
                    break;
                }
            }
        }

        if !matched && options.include_default {
            buckets
                .entry(DEFAULT_BRANCH.to_string())
                .or_default()
                .push(item);
        }
    }

    Ok(buckets)
}
