//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; binaries and tests decide
//! where they go.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the `jsonkv` binary.
///
/// `RUST_LOG` wins when set; otherwise `level` applies to this crate and
/// everything else logs warnings only. Output goes to stderr so command
/// results on stdout stay machine-readable.
///
/// # Panics
///
/// Panics if tracing has already been initialized.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,jsonkv={level}")));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    tracing::debug!(level, "Tracing initialized");
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
