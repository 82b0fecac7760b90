//! Time-based combinators and cancellation

use kairo_core::constants::OP_TIMEOUT;
use kairo_core::{Operation, PipelineError, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

/// Suspend the current task for `duration`
pub async fn delay(duration: Duration) {
    sleep(duration).await;
}

/// Wrap an operation so every invocation starts after `duration`
pub fn delayed<I, O>(op: Operation<I, O>, duration: Duration) -> Operation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    let label = format!("delayed({})", op.name());
    Operation::async_fallible(move |input: I| {
        let op = op.clone();
        async move {
            sleep(duration).await;
            op.invoke(input).await
        }
    })
    .labeled(label)
}

/// Race a fallible future against a timer.
///
/// On expiry the future is dropped, so it stops making progress at its next
/// suspension point.
pub async fn timeout<Fut, T>(future: Fut, duration: Duration) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(timeout_ms = duration.as_millis() as u64, "operation timed out");
            Err(timed_out(duration))
        }
    }
}

/// Bound every invocation of an operation by `duration`
pub fn with_timeout<I, O>(op: Operation<I, O>, duration: Duration) -> Operation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    let label = format!("timeout({})", op.name());
    Operation::async_fallible(move |input: I| {
        let op = op.clone();
        async move { timeout(op.invoke(input), duration).await }
    })
    .labeled(label)
}

fn timed_out(duration: Duration) -> PipelineError {
    PipelineError::new(
        OP_TIMEOUT,
        format!("Operation timed out after {}ms", duration.as_millis()),
    )
    .with_context("timeout_ms", duration.as_millis() as u64)
}

/// Cloneable cancellation token.
///
/// Every clone observes the same state; cancelling any of them cancels all.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSignal {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the signal has been cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // sender is owned by every clone, so this only happens during teardown
            std::future::pending::<()>().await;
        }
    }
}

/// Like [`timeout`], but also gives up as soon as `signal` is cancelled
pub async fn timeout_with_token<Fut, T>(
    future: Fut,
    duration: Duration,
    signal: &CancellationSignal,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = signal.cancelled() => {
            Err(PipelineError::new(OP_TIMEOUT, "Operation cancelled").with_context("cancelled", true))
        }
        result = timeout(future, duration) => result,
    }
}

/// Operation that only runs for the last call in a quiet window
pub struct Debounced<I, O> {
    op: Operation<I, O>,
    wait: Duration,
    generation: Arc<AtomicU64>,
}

impl<I, O> Clone for Debounced<I, O> {
    fn clone(&self) -> Self {
        Self {
            op: self.op.clone(),
            wait: self.wait,
            generation: Arc::clone(&self.generation),
        }
    }
}

/// Debounce an operation by `wait`
pub fn debounce<I, O>(op: Operation<I, O>, wait: Duration) -> Debounced<I, O> {
    Debounced {
        op,
        wait,
        generation: Arc::new(AtomicU64::new(0)),
    }
}

impl<I, O> Debounced<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Wait out the quiet window, then run.
    ///
    /// Returns `None` when a later call superseded this one.
    pub async fn call(&self, input: I) -> Option<Result<O>> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        sleep(self.wait).await;

        if self.generation.load(Ordering::SeqCst) != ticket {
            tracing::trace!(operation = self.op.name(), "debounced call superseded");
            return None;
        }
        Some(self.op.invoke(input).await)
    }
}

/// Operation that runs at most once per interval
pub struct Throttled<I, O> {
    op: Operation<I, O>,
    interval: Duration,
    last_run: Arc<Mutex<Option<Instant>>>,
}

impl<I, O> Clone for Throttled<I, O> {
    fn clone(&self) -> Self {
        Self {
            op: self.op.clone(),
            interval: self.interval,
            last_run: Arc::clone(&self.last_run),
        }
    }
}

/// Throttle an operation to one run per `interval`
pub fn throttle<I, O>(op: Operation<I, O>, interval: Duration) -> Throttled<I, O> {
    Throttled {
        op,
        interval,
        last_run: Arc::new(Mutex::new(None)),
    }
}

impl<I, O> Throttled<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Run now, or return `None` if the previous run was too recent
    pub async fn call(&self, input: I) -> Option<Result<O>> {
        if !self.try_acquire() {
            tracing::trace!(operation = self.op.name(), "throttled call dropped");
            return None;
        }
        Some(self.op.invoke(input).await)
    }

    fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut last_run = self.last_run.lock();
        match *last_run {
            Some(previous) if now.duration_since(previous) < self.interval => false,
            _ => {
                *last_run = Some(now);
                true
            }
        }
    }
}
