//! Logging initializer (SPEC_FULL.md §6.6).
//!
//! The core never installs a global subscriber on its own — the external
//! CLI front end calls this once at startup, mirroring the teacher's
//! `init_logging()` in `app::main` but collapsed to stderr only, since
//! file rotation and retention are CLI-front-end concerns (out of scope,
//! spec.md §1).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a `tracing_subscriber` registry with an `EnvFilter` read from
/// `RUST_LOG` (defaulting to the configured `log_level` when unset) and a
/// stderr formatting layer.
pub fn init_tracing(default_log_level: &str) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(default_log_level.to_string()));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
