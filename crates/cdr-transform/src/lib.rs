//! Transformation stages of the CDR staging pipeline.
//!
//! # Overview
//!
//! - **Domain normalization**: `sm_ae201` becomes `AE`
//! - **Unflattening**: wide extracts pivoted into long question/answer frames
//! - **Dimension resolution**: natural keys swapped for surrogate ids
//! - **Reconciliation**: rows conformed to a staging table's column list
//!
//! # Example
//!
//! ```ignore
//! use cdr_transform::{Reconciler, Unflattener, normalize_domain_label, resolve_dimensions};
//!
//! let domain_name = normalize_domain_label(&extract.domain_label)?;
//! let unflattener = Unflattener::new(&config, run_started);
//! if let Some(mut long) = unflattener.unflatten(&extract, &domain_name, &mut report)? {
//!     resolve_dimensions(&mut long.frame, &dims, &config.dimensions, &extract.domain_label, &mut report)?;
//!     let rows = Reconciler::new(&config, run_started)
//!         .reconcile(&long.frame, &config.stg_pred.db_cols, &extract.domain_label, &mut report)?;
//! }
//! ```

mod cancel;
mod datetime;
mod domain;
mod error;
mod reconcile;
mod resolve;
mod unflatten;

pub use cancel::CancelFlag;
pub use datetime::{parse_timestamp, sentinel_timestamp};
pub use domain::{MalformedDomainLabel, normalize_domain_label};
pub use error::{Result, TransformError};
pub use reconcile::Reconciler;
pub use resolve::{ResolveStats, apply_column_copies, resolve_dimensions};
pub use unflatten::{
    ANSWER_COLUMN, CREATED_COLUMN, DOMAIN_COLUMN, QUESTION_COLUMN, UnflattenedDomain, Unflattener,
};
