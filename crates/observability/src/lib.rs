//! Tracing/logging setup shared by binaries and tests.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize process-wide tracing with the format taken from `LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}
