//! Library components of the `cdr-ingest` command line tool.

pub mod logging;
pub mod report;
