//! Per-run orchestration of the CDR staging pipeline.
//!
//! # Example
//!
//! ```ignore
//! use cdr_core::{RunContext, load_dimensions, load_extracts, run_pipeline};
//! use cdr_model::RunReport;
//! use cdr_stage::MemoryGateway;
//!
//! let extracts = load_extracts(extract_dir)?;
//! let dims = load_dimensions(Some(maps_dir), &config)?;
//! let mut gateway = MemoryGateway::new();
//! let mut report = RunReport::new();
//! let summary = run_pipeline(&extracts, &RunContext::new(&config, &dims), &mut gateway, &mut report)?;
//! ```

mod context;
mod error;
mod pipeline;
mod summary;

pub use cdr_transform::CancelFlag;
pub use context::RunContext;
pub use error::{PipelineError, Result};
pub use pipeline::{load_dimensions, load_extracts, run_pipeline};
pub use summary::{DomainStatus, DomainSummary, RunSummary};
