//! Configuration contract errors.
//!
//! These are the only errors that abort a whole run; everything data-related
//! is reported as an [`Issue`](crate::Issue) instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a [`PipelineConfig`](crate::PipelineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// `base_cols` must name at least one identifier column.
    #[error("base_cols is empty")]
    EmptyBaseColumns,

    /// A target column list is empty.
    #[error("{table}.db_cols is empty")]
    EmptyColumnList { table: String },

    /// A target column list contains a blank name.
    #[error("{table}.db_cols contains a blank column name")]
    BlankColumnName { table: String },

    /// A target column list names the same column twice.
    #[error("{table}.db_cols lists '{column}' more than once")]
    DuplicateColumn { table: String, column: String },

    /// A column the router depends on is absent from a target list.
    #[error("{table}.db_cols must contain the {role} column '{column}'")]
    MissingColumn {
        table: String,
        column: String,
        role: &'static str,
    },

    /// A sampling limit of zero would drop every row.
    #[error("sample_limit must be greater than zero")]
    ZeroSampleLimit,
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
