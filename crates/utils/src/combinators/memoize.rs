//! Result caching for operations.
//!
//! A cache belongs to one [`Memoized`] handle and its clones. Each entry is
//! the shared run for its key, so overlapping calls with equal keys await a
//! single invocation. Failed runs are evicted and re-attempted on the next
//! call.

use futures::future::{BoxFuture, FutureExt, Shared};
use kairo_config::EngineConfig;
use kairo_core::constants::OP_MEMOIZE;
use kairo_core::unwind::capture;
use kairo_core::{Operation, Result};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

type Pending<O> = Shared<BoxFuture<'static, Result<O>>>;

enum Store<K, V> {
    Unbounded(HashMap<K, V>),
    Bounded(LruCache<K, V>),
}

impl<K: Hash + Eq, V: Clone> Store<K, V> {
    fn get(&mut self, key: &K) -> Option<V> {
        match self {
            Store::Unbounded(map) => map.get(key).cloned(),
            Store::Bounded(cache) => cache.get(key).cloned(),
        }
    }

    fn insert(&mut self, key: K, value: V) {
        match self {
            Store::Unbounded(map) => {
                map.insert(key, value);
            }
            Store::Bounded(cache) => {
                cache.put(key, value);
            }
        }
    }

    fn remove(&mut self, key: &K) {
        match self {
            Store::Unbounded(map) => {
                map.remove(key);
            }
            Store::Bounded(cache) => {
                cache.pop(key);
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Store::Unbounded(map) => map.len(),
            Store::Bounded(cache) => cache.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            Store::Unbounded(map) => map.clear(),
            Store::Bounded(cache) => cache.clear(),
        }
    }
}

type KeyFn<I, K> = dyn Fn(&I) -> K + Send + Sync;

/// An operation with a result cache keyed on its input
pub struct Memoized<I, K, O> {
    op: Operation<I, O>,
    key_fn: Arc<KeyFn<I, K>>,
    cache: Arc<Mutex<Store<K, Pending<O>>>>,
}

impl<I, K, O> Clone for Memoized<I, K, O> {
    fn clone(&self) -> Self {
        Self {
            op: self.op.clone(),
            key_fn: Arc::clone(&self.key_fn),
            cache: Arc::clone(&self.cache),
        }
    }
}

/// Cache every successful result, keyed on the input itself
pub fn memoize<I, O>(op: Operation<I, O>) -> Memoized<I, I, O>
where
    I: Hash + Eq + Clone + Send + 'static,
    O: Clone + Send + 'static,
{
    memoize_by(|input: &I| input.clone(), op)
}

/// Cache at most `capacity` results, evicting the least recently used
pub fn memoize_bounded<I, O>(op: Operation<I, O>, capacity: NonZeroUsize) -> Memoized<I, I, O>
where
    I: Hash + Eq + Clone + Send + 'static,
    O: Clone + Send + 'static,
{
    Memoized {
        op,
        key_fn: Arc::new(|input: &I| input.clone()),
        cache: Arc::new(Mutex::new(Store::Bounded(LruCache::new(capacity)))),
    }
}

/// Cache results under a key derived from the input
pub fn memoize_by<I, K, O, F>(key_fn: F, op: Operation<I, O>) -> Memoized<I, K, O>
where
    K: Hash + Eq,
    F: Fn(&I) -> K + Send + Sync + 'static,
{
    Memoized {
        op,
        key_fn: Arc::new(key_fn),
        cache: Arc::new(Mutex::new(Store::Unbounded(HashMap::new()))),
    }
}

impl<I, O> Memoized<I, I, O>
where
    I: Hash + Eq + Clone + Send + 'static,
    O: Clone + Send + 'static,
{
    /// Bounded by `memoize_capacity` when configured, unbounded otherwise
    pub fn from_config(op: Operation<I, O>, config: &EngineConfig) -> Self {
        match config.memoize_capacity.and_then(NonZeroUsize::new) {
            Some(capacity) => memoize_bounded(op, capacity),
            None => memoize(op),
        }
    }
}

impl<I, K, O> Memoized<I, K, O>
where
    I: Send + 'static,
    K: Hash + Eq + Clone + Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Return the cached result for this input, computing it on a miss
    pub async fn call(&self, input: I) -> Result<O> {
        let key = capture(OP_MEMOIZE, || (self.key_fn)(&input))?;

        let pending = {
            let mut cache = self.cache.lock();
            if let Some(entry) = cache.get(&key) {
                tracing::trace!(operation = self.op.name(), "memoize hit");
                entry
            } else {
                let op = self.op.clone();
                let entry = async move { op.invoke(input).await }.boxed().shared();
                cache.insert(key.clone(), entry.clone());
                entry
            }
        };

        let result = pending.clone().await;
        if result.is_err() {
            let mut cache = self.cache.lock();
            if cache.get(&key).is_some_and(|current| current.ptr_eq(&pending)) {
                cache.remove(&key);
            }
        }
        result
    }

    /// Number of cached results, counting runs still in flight
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Expose the cached handle as a plain operation sharing the same cache
    pub fn into_operation(self) -> Operation<I, O> {
        let label = format!("memoize({})", self.op.name());
        Operation::async_fallible(move |input: I| {
            let memoized = self.clone();
            async move { memoized.call(input).await }
        })
        .labeled(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairo_core::PipelineError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_square(calls: Arc<AtomicUsize>) -> Operation<u64> {
        Operation::sync(move |x: u64| {
            calls.fetch_add(1, Ordering::SeqCst);
            x * x
        })
    }

    #[tokio::test]
    async fn test_equal_inputs_invoke_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let square = memoize(counting_square(Arc::clone(&calls)));

        assert_eq!(square.call(9).await.unwrap(), 81);
        assert_eq!(square.call(9).await.unwrap(), 81);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        square.call(3).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(square.len(), 2);
    }

    #[tokio::test]
    async fn test_bounded_cache_evicts_least_recent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let capacity = NonZeroUsize::new(2).unwrap();
        let square = memoize_bounded(counting_square(Arc::clone(&calls)), capacity);

        for x in [1, 2, 3] {
            square.call(x).await.unwrap();
        }
        assert_eq!(square.len(), 2);

        // 1 was evicted
        square.call(1).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let flaky = Operation::fallible(move |x: i32| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PipelineError::new("flaky", "first call fails"))
            } else {
                Ok(x)
            }
        });
        let memoized = memoize(flaky);

        assert!(memoized.call(1).await.is_err());
        assert_eq!(memoized.call(1).await.unwrap(), 1);
        assert_eq!(memoized.call(1).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_memoize_by_derived_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let op = Operation::sync(move |s: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            s.to_uppercase()
        });
        let memoized = memoize_by(|s: &String| s.to_lowercase(), op);

        assert_eq!(memoized.call("Hello".to_string()).await.unwrap(), "HELLO");
        assert_eq!(memoized.call("HELLO".to_string()).await.unwrap(), "HELLO");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        memoized.clear();
        assert!(memoized.is_empty());
    }

    #[tokio::test]
    async fn test_operation_shares_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let memoized = memoize(counting_square(Arc::clone(&calls)));
        let handle = memoized.clone();
        let op = memoized.into_operation();

        op.invoke(4).await.unwrap();
        op.invoke(4).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.len(), 1);
    }

    fn slow_square(calls: Arc<AtomicUsize>) -> Operation<u64> {
        Operation::asynchronous(move |x: u64| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                x * x
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_calls_share_one_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let square = memoize(slow_square(Arc::clone(&calls)));

        let (a, b, c) = futures::join!(square.call(5), square.call(5), square.call(5));

        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (25, 25, 25));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(square.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_failure_is_shared_then_evicted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let op = Operation::async_fallible(move |x: i32| {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if call == 0 {
                    Err(PipelineError::new("flaky", "first run fails"))
                } else {
                    Ok(x)
                }
            }
        });
        let memoized = memoize(op);

        let (a, b) = futures::join!(memoized.call(1), memoized.call(1));
        assert!(a.is_err() && b.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(memoized.is_empty());

        assert_eq!(memoized.call(1).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_key_fn_is_an_error() {
        let memoized = memoize_by(
            |_: &i32| -> i32 { panic!("no key") },
            Operation::sync(|x: i32| x),
        );

        let error = memoized.call(1).await.unwrap_err();
        assert_eq!(error.operation, "memoize");
        assert_eq!(error.message, "no key");
    }

    #[tokio::test]
    async fn test_from_config_honours_capacity() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = EngineConfig {
            memoize_capacity: Some(1),
            ..EngineConfig::default()
        };
        let square = Memoized::from_config(counting_square(Arc::clone(&calls)), &config);

        square.call(2).await.unwrap();
        square.call(3).await.unwrap();
        assert_eq!(square.len(), 1);

        let unbounded = Memoized::from_config(
            counting_square(Arc::clone(&calls)),
            &EngineConfig::default(),
        );
        for x in [1, 2, 3] {
            unbounded.call(x).await.unwrap();
        }
        assert_eq!(unbounded.len(), 3);
    }
}
