use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the process-wide structured logger. Mirrors the JSON/fmt
/// subscriber every mode's `main` wires up, parameterized by the
/// `--log-level` flag with `RUST_LOG` still taking precedence when set.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .with_current_span(true)
        .init();
}
