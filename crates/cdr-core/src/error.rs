use thiserror::Error;

use cdr_ingest::IngestError;
use cdr_model::ConfigError;
use cdr_stage::GatewayError;

/// Errors that abort a whole run.
///
/// Everything below run level (a malformed domain, a failed write) is
/// reported as an issue instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load inputs: {0}")]
    Ingest(#[from] IngestError),

    #[error("staging store error: {0}")]
    Gateway(#[from] GatewayError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
