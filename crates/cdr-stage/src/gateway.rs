use thiserror::Error;

use cdr_model::StagedRow;

use crate::statement::Statement;

/// Errors raised by a [`StagingGateway`].
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A statement could not be applied.
    #[error("{table}: {message}")]
    Write { table: String, message: String },

    /// A query could not be answered.
    #[error("query on {table} failed: {message}")]
    Query { table: String, message: String },

    /// Transaction control used out of order.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Backing storage could not be read or written.
    #[error("staging store I/O on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing CSV storage is malformed.
    #[error("staging store CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Blocking request/response access to the staging tables.
///
/// Statements run one at a time. Between [`StagingGateway::begin`] and
/// [`StagingGateway::commit`] every statement belongs to one transaction that
/// [`StagingGateway::rollback`] undoes entirely.
pub trait StagingGateway {
    /// Apply a write statement, returning the number of rows affected.
    fn execute(&mut self, statement: &Statement) -> Result<u64>;

    /// Run a select statement.
    fn query(&mut self, statement: &Statement) -> Result<Vec<StagedRow>>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

impl<G: StagingGateway + ?Sized> StagingGateway for &mut G {
    fn execute(&mut self, statement: &Statement) -> Result<u64> {
        (**self).execute(statement)
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<StagedRow>> {
        (**self).query(statement)
    }

    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<()> {
        (**self).rollback()
    }
}
