//! Extract ingestion for the CDR staging pipeline.
//!
//! This crate finds per-domain extract files in a directory, reads them into
//! Polars DataFrames and loads warehouse dimension maps from CSV.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use cdr_ingest::{CsvDimensionProvider, load_extracts};
//! use cdr_model::{DimensionKind, DimensionMap};
//!
//! let extracts = load_extracts(Path::new("extracts/STUDY01"))?;
//! let provider = CsvDimensionProvider::new("maps/STUDY01");
//! let dims = DimensionMap::load(&provider, DimensionKind::ALL)?;
//! ```

mod csv;
mod discovery;
mod error;
mod maps;

// === Error Types ===
pub use error::{IngestError, Result};

// === CSV Reading ===
pub use csv::{MAX_CSV_FILE_SIZE, check_file_size, read_extract};

// === File Discovery ===
pub use discovery::{DiscoveredExtract, discover_extracts, list_csv_files, load_extracts};

// === Dimension Maps ===
pub use maps::CsvDimensionProvider;
