//! Development logging.

/// Install a `tracing` subscriber when `RUST_LOG` is set.
///
/// Benches and tests call `wsbridge::dev_tracing::init_tracing()` to see the
/// `[STREAM]` and `[DRIVER]` logs. Does nothing when `RUST_LOG` is unset or
/// a global subscriber is already installed.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
