//! Logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured default level. Output
/// goes to stderr so stdout stays free for command results.
///
/// # Example
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("client core started");
/// ```
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // try_init so a second call (e.g. from tests) is a no-op instead of a panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
