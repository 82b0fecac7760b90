use tracing::{span, Level, Span};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging for binaries and tests that embed the engine.
///
/// Honours `RUST_LOG`, defaulting to `info`. Returns an error rather than
/// panicking when a global subscriber is already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Span wrapping one top-level engine operation
pub fn operation_span(operation: &str, operation_id: &str) -> Span {
    span!(Level::DEBUG, "pipeline_op", operation = %operation, operation_id = %operation_id)
}

/// Emit a structured event when an opt-in recovery policy absorbed a failure
pub fn recovered_failure(operation: &str, index: usize, message: &str, policy: &str) {
    tracing::warn!(
        operation = %operation,
        index = index,
        policy = %policy,
        error = %message,
        "failure absorbed by recovery policy"
    );
}
