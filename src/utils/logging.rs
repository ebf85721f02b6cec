// src/utils/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber.
/// Filters come from `RUST_LOG`; without it the extractor logs at INFO and
/// dependencies (lopdf, html5ever) only at WARN.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,annual_report_extractor=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // stdout stays free for dataset output
        .init();

    tracing::debug!("Logging setup complete.");
}
