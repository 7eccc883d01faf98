//! Shared utilities for the CDR ingestion crates.
//!
//! This crate provides helpers for reading Polars `AnyValue` cells as text
//! and numbers, used by the ingest, transform and staging crates, plus the
//! switch that keeps row-level values out of the logs.

pub mod polars;
pub mod redact;

// Re-export commonly used functions at crate root for convenience
pub use polars::{
    any_to_f64, any_to_i64, any_to_string, any_to_text, format_numeric, is_missing_text,
    parse_f64, parse_i64,
};
pub use redact::{REDACTED_VALUE, log_data_enabled, redact_value, set_log_data};
