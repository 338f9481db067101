//! Telemetry helpers for structured logging and tracing.

/// Install a default env-filtered subscriber unless one is already set.
///
/// Thread names are included so heartbeat and `{pool}-worker-{n}` output can
/// be told apart. Filtering follows `RUST_LOG`.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_names(true)
        .try_init();
}
