//! Tracing subscriber setup.
//!
//! Log lines go to stderr. The filter comes from `RUST_LOG`, falling back
//! to `info` so degrade events (missing or malformed documents) are visible
//! by default.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
