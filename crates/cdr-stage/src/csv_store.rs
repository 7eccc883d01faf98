//! File-backed staging tables.
//!
//! Each table lives in `<dir>/<schema>.<table>.csv`. Values are kept as text;
//! an empty cell reads back as null.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cdr_model::{StageTable, StageValue, StagedRow};

use crate::gateway::{GatewayError, Result, StagingGateway};
use crate::memory::MemoryGateway;
use crate::statement::Statement;

/// Staging tables loaded from and saved to CSV.
#[derive(Debug)]
pub struct CsvStagingStore {
    dir: PathBuf,
    schema: String,
    active_columns: Arc<[String]>,
    deleted_columns: Arc<[String]>,
    inner: MemoryGateway,
}

impl CsvStagingStore {
    /// Open the store, loading any tables already present in `dir`.
    pub fn open(
        dir: impl Into<PathBuf>,
        schema: &str,
        active_columns: &[String],
        deleted_columns: &[String],
    ) -> Result<Self> {
        let dir = dir.into();
        let schema = schema.trim().to_lowercase();
        let active = read_table(&table_path(&dir, &schema, StageTable::Active))?;
        let deleted = read_table(&table_path(&dir, &schema, StageTable::Deleted))?;
        tracing::info!(
            dir = %dir.display(),
            schema = %schema,
            active = active.len(),
            deleted = deleted.len(),
            "opened staging store"
        );
        Ok(Self {
            dir,
            schema,
            active_columns: active_columns.iter().cloned().collect(),
            deleted_columns: deleted_columns.iter().cloned().collect(),
            inner: MemoryGateway::with_rows(active, deleted),
        })
    }

    pub fn rows(&self, table: StageTable) -> &[StagedRow] {
        self.inner.rows(table)
    }

    /// Path of a table's CSV file.
    pub fn path(&self, table: StageTable) -> PathBuf {
        table_path(&self.dir, &self.schema, table)
    }

    /// Write both tables, projected onto their configured columns.
    pub fn save(&self) -> Result<()> {
        if self.inner.in_transaction() {
            return Err(GatewayError::Transaction(
                "cannot save with an open transaction".to_string(),
            ));
        }
        std::fs::create_dir_all(&self.dir).map_err(|source| GatewayError::Io {
            path: self.dir.clone(),
            source,
        })?;
        for (table, columns) in [
            (StageTable::Active, &self.active_columns),
            (StageTable::Deleted, &self.deleted_columns),
        ] {
            let path = self.path(table);
            write_table(&path, columns, self.inner.rows(table))?;
            tracing::debug!(
                path = %path.display(),
                rows = self.inner.rows(table).len(),
                "saved staging table"
            );
        }
        Ok(())
    }
}

impl StagingGateway for CsvStagingStore {
    fn execute(&mut self, statement: &Statement) -> Result<u64> {
        self.inner.execute(statement)
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<StagedRow>> {
        self.inner.query(statement)
    }

    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }
}

fn table_path(dir: &Path, schema: &str, table: StageTable) -> PathBuf {
    dir.join(format!("{}.csv", table.qualified(schema)))
}

fn read_table(path: &Path) -> Result<Vec<StagedRow>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let columns: Arc<[String]> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let values = record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    StageValue::Null
                } else {
                    StageValue::text(cell)
                }
            })
            .collect();
        rows.push(StagedRow::new(Arc::clone(&columns), values));
    }
    Ok(rows)
}

fn write_table(path: &Path, columns: &Arc<[String]>, rows: &[StagedRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns.iter())?;
    for row in rows {
        let projected = row.project(columns);
        writer.write_record(projected.values().iter().map(StageValue::render))?;
    }
    writer.flush().map_err(|source| GatewayError::Io {
        path: path.to_path_buf(),
        source,
    })
}
