//! Tracing subscriber bootstrap shared by every binary in the workspace.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber from `RUST_LOG`, defaulting to
/// `info` when unset. Safe to call once per process; later calls are no-ops
/// if a subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
