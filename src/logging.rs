//! Tracing setup. The crate never installs a global subscriber itself —
//! [`init_tracing`] is a convenience for binaries and tests that want one,
//! library embedders wire their own.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` formatter reading its filter from
/// `RUST_LOG`, defaulting to `info` when unset.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
