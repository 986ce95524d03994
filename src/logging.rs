//! Logging setup for the provider.
//!
//! All output goes to **stderr**; the host reads the provider's stdout.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter (e.g. `info`, `monad_provider=debug`)
//!
//! ```bash
//! RUST_LOG=monad_provider=debug,reqwest=info terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, util::TryInitError, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn install(default_level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
}

/// Initialize logging at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Initialize logging with a custom default level used when `RUST_LOG` is
/// not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    if let Err(err) = install(default_level) {
        panic!("failed to install tracing subscriber: {}", err);
    }
}

/// Try to initialize logging, returning `false` if a subscriber was already
/// set.
pub fn try_init_logging() -> bool {
    install(DEFAULT_LEVEL).is_ok()
}
