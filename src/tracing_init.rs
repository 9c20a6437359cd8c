//! Tracing initialization for the stacking binary and for tests
//!
//! Uses RUST_LOG environment-based filtering:
//! - `RUST_LOG=ccstack=debug` - show per-trace skip reasons
//! - `RUST_LOG=ccstack::stack=trace` - trace a specific module
//!
//! With a log prefix configured, output goes to `<prefix>_000.txt` instead
//! of stderr, mirroring the per-run log files of the original workflow.

#[cfg(test)]
use once_cell::sync::Lazy;
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ccstack=info"))
}

/// Initialize tracing for the binary. Call once, early in `main()`.
pub fn init_tracing(log_prefix: Option<&str>) -> std::io::Result<()> {
    match log_prefix {
        Some(prefix) => {
            let file = File::create(format!("{prefix}_000.txt"))?;
            fmt()
                .with_env_filter(default_filter())
                .with_target(true)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .init();
        }
        None => {
            fmt()
                .with_env_filter(default_filter())
                .with_target(true)
                .init();
        }
    }
    Ok(())
}

/// Initialize tracing for tests. Safe to call from every test; only the
/// first call installs the subscriber.
#[cfg(test)]
pub fn init_test_tracing() {
    static TRACING: Lazy<()> = Lazy::new(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ccstack=warn"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_test_writer()
            .try_init();
    });
    Lazy::force(&TRACING);
}
