//! Dimension maps exported as CSV.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use polars::prelude::AnyValue;

use cdr_common::{any_to_i64, any_to_text};
use cdr_model::{DimensionKind, DimensionProvider, SurrogateId};

use crate::csv::read_extract;
use crate::error::{IngestError, Result};

/// Reads `<dir>/map_<dimension>.csv` files.
///
/// Each file carries the natural key and surrogate id columns of its map
/// table (`item_nm,item_id`, `form_nm,form_id`, ...). A missing file yields an
/// empty lookup, so every key of that dimension resolves to the sentinel.
#[derive(Debug, Clone)]
pub struct CsvDimensionProvider {
    dir: PathBuf,
}

impl CsvDimensionProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, kind: DimensionKind) -> PathBuf {
        self.dir.join(format!("{}.csv", kind.table_name()))
    }
}

impl DimensionProvider for CsvDimensionProvider {
    type Error = IngestError;

    fn lookup(&self, kind: DimensionKind) -> Result<HashMap<String, SurrogateId>> {
        let path = self.path_for(kind);
        if !path.is_file() {
            tracing::warn!(
                dimension = %kind,
                path = %path.display(),
                "dimension map file not found, lookup is empty"
            );
            return Ok(HashMap::new());
        }

        let df = read_extract(&path)?;
        let (key_col, id_col) = kind.key_columns();
        let keys = df.column(key_col).map_err(|_| IngestError::MissingColumn {
            column: key_col.to_string(),
            path: path.clone(),
        })?;
        let ids = df.column(id_col).map_err(|_| IngestError::MissingColumn {
            column: id_col.to_string(),
            path: path.clone(),
        })?;

        let mut entries = HashMap::with_capacity(df.height());
        let mut skipped = 0usize;
        for idx in 0..df.height() {
            let key = any_to_text(keys.get(idx).unwrap_or(AnyValue::Null));
            let id = any_to_i64(ids.get(idx).unwrap_or(AnyValue::Null));
            match (key, id) {
                (Some(key), Some(id)) if !key.trim().is_empty() => {
                    entries.entry(key).or_insert(id);
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(
                dimension = %kind,
                path = %path.display(),
                skipped,
                "map rows without a key or numeric id were skipped"
            );
        }
        Ok(entries)
    }
}
