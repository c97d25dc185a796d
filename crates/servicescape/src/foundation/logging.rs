//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
///
/// Call once from the host application. Panics if a logger is already set.
pub fn init() {
    env_logger::init();
}

/// Initialize logging if nothing else has yet; safe to call repeatedly
/// (tests, embedded hosts)
pub fn try_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
