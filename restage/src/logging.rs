//! Development-time tracing for debugging stage runs.
//!
//! Diagnostics are strictly separate from product output: transformed text
//! goes to the sink (stdout in the CLI), tracing goes to stderr and is
//! controlled by `RUST_LOG`. Nothing here affects what the stage emits.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=restage=debug restage run --loop 'a' 'b' < input.txt
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
