//! Staging persistence for CDR events.
//!
//! Long records end up in one of two tables: `stg_pred` for active rows and
//! `stg_pred_del` for rows superseded by a deletion. Writes are expressed as
//! [`Statement`]s and applied through a [`StagingGateway`]; [`AuditRouter`]
//! decides which statements a reconciled batch turns into.

mod csv_store;
mod gateway;
mod memory;
mod router;
mod statement;

pub use csv_store::CsvStagingStore;
pub use gateway::{GatewayError, Result, StagingGateway};
pub use memory::MemoryGateway;
pub use router::{AuditPartition, AuditRouter, RouteStats, partition_frame};
pub use statement::Statement;
