//! Data model for turning wide EDC extracts into CDR staging events.
//!
//! The transform, staging and pipeline crates all speak these types.
//!
//! - **config**: typed, validated [`PipelineConfig`]
//! - **extract**: [`DomainExtract`] input tables and [`ItemAnswerRecord`] output units
//! - **dimension**: surrogate-key lookup snapshots ([`DimensionMap`])
//! - **staging**: staged rows, values and events
//! - **issue**: non-fatal issue taxonomy and the [`RunReport`] sink

pub mod config;
pub mod dimension;
pub mod error;
pub mod extract;
pub mod issue;
pub mod lookup;
pub mod staging;

pub use config::{
    ColumnCopy, DimensionBinding, PipelineConfig, SourceColumnOverrides, SourceColumns,
    SourceSystem, StageTableConfig, load_config,
};
pub use dimension::{DimensionKind, DimensionMap, DimensionProvider, SurrogateId, UNRESOLVED_ID};
pub use error::{ConfigError, Result};
pub use extract::{DomainExtract, ItemAnswerRecord};
pub use issue::{Issue, IssueKind, IssueSeverity, IssueSink, RunReport};
pub use lookup::CaseInsensitiveMap;
pub use staging::{
    EventStatus, IdentityKey, NULL_SENTINEL, StageTable, StageValue, StagedEvent, StagedRow,
    TIMESTAMP_FORMAT,
};
