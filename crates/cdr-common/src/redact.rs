//! Row-level value redaction for log output.
//!
//! Subject identifiers and answers are clinical data. They only reach the
//! logs after [`set_log_data`] has been switched on (the CLI's `--log-data`).

use std::sync::atomic::{AtomicBool, Ordering};

static LOG_DATA_ENABLED: AtomicBool = AtomicBool::new(false);

/// Placeholder used when row-level logging is disabled.
pub const REDACTED_VALUE: &str = "[REDACTED]";

pub fn set_log_data(enabled: bool) {
    LOG_DATA_ENABLED.store(enabled, Ordering::Release);
}

/// Returns true if row-level logging is explicitly enabled.
pub fn log_data_enabled() -> bool {
    LOG_DATA_ENABLED.load(Ordering::Acquire)
}

/// Returns the input value when row-level logging is enabled, otherwise a
/// redacted token. Empty values pass through.
pub fn redact_value(value: &str) -> &str {
    if value.is_empty() || log_data_enabled() {
        value
    } else {
        REDACTED_VALUE
    }
}
