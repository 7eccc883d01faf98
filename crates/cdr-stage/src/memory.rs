use cdr_model::{IdentityKey, StageTable, StageValue, StagedRow};

use crate::gateway::{GatewayError, Result, StagingGateway};
use crate::statement::Statement;

#[derive(Debug, Clone, Default)]
struct Tables {
    active: Vec<StagedRow>,
    deleted: Vec<StagedRow>,
}

impl Tables {
    fn rows_mut(&mut self, table: StageTable) -> &mut Vec<StagedRow> {
        match table {
            StageTable::Active => &mut self.active,
            StageTable::Deleted => &mut self.deleted,
        }
    }

    fn rows(&self, table: StageTable) -> &[StagedRow] {
        match table {
            StageTable::Active => &self.active,
            StageTable::Deleted => &self.deleted,
        }
    }
}

/// In-memory staging tables.
///
/// Transactions snapshot both tables on [`StagingGateway::begin`] and restore
/// the snapshot on [`StagingGateway::rollback`]. Writes to a table can be
/// made to fail with [`MemoryGateway::fail_writes_to`], which is how the
/// router's failure handling is exercised.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    tables: Tables,
    snapshot: Option<Tables>,
    failing: Option<StageTable>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing table contents.
    pub fn with_rows(active: Vec<StagedRow>, deleted: Vec<StagedRow>) -> Self {
        Self {
            tables: Tables { active, deleted },
            ..Self::default()
        }
    }

    /// Current rows of a table.
    pub fn rows(&self, table: StageTable) -> &[StagedRow] {
        self.tables.rows(table)
    }

    /// Make every subsequent write to `table` fail.
    pub fn fail_writes_to(&mut self, table: StageTable) {
        self.failing = Some(table);
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn check_writable(&self, table: StageTable) -> Result<()> {
        if self.failing == Some(table) {
            return Err(GatewayError::Write {
                table: table.to_string(),
                message: "table rejected the write".to_string(),
            });
        }
        Ok(())
    }
}

fn matches_key(row: &StagedRow, column: &str, key: &StageValue) -> bool {
    IdentityKey::from_value(key).is_some_and(|key| row.identity(column) == Some(key))
}

/// Conflict key of a row; `None` when any part is absent, since absent
/// values never conflict.
fn conflict_key(row: &StagedRow, columns: &[String]) -> Option<Vec<IdentityKey>> {
    columns.iter().map(|column| row.identity(column)).collect()
}

impl StagingGateway for MemoryGateway {
    fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let table = statement.table();
        match statement {
            Statement::Insert { row, .. } => {
                self.check_writable(table)?;
                self.tables.rows_mut(table).push(row.clone());
                Ok(1)
            }
            Statement::Upsert {
                conflict_columns,
                row,
                ..
            } => {
                self.check_writable(table)?;
                let rows = self.tables.rows_mut(table);
                if let Some(key) = conflict_key(row, conflict_columns) {
                    rows.retain(|existing| {
                        conflict_key(existing, conflict_columns).as_ref() != Some(&key)
                    });
                }
                rows.push(row.clone());
                Ok(1)
            }
            Statement::DeleteByIdentity {
                identity_column,
                key,
                ..
            } => {
                self.check_writable(table)?;
                let rows = self.tables.rows_mut(table);
                let before = rows.len();
                rows.retain(|existing| !matches_key(existing, identity_column, key));
                Ok((before - rows.len()) as u64)
            }
            Statement::SelectByIdentity { .. } => Err(GatewayError::Write {
                table: table.to_string(),
                message: "select statements go through query".to_string(),
            }),
        }
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<StagedRow>> {
        match statement {
            Statement::SelectByIdentity {
                table,
                identity_column,
                key,
            } => Ok(self
                .tables
                .rows(*table)
                .iter()
                .filter(|row| matches_key(row, identity_column, key))
                .cloned()
                .collect()),
            other => Err(GatewayError::Query {
                table: other.table().to_string(),
                message: "only identity selects can be queried".to_string(),
            }),
        }
    }

    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(GatewayError::Transaction(
                "transaction already open".to_string(),
            ));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| GatewayError::Transaction("commit without begin".to_string()))
    }

    fn rollback(&mut self) -> Result<()> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| GatewayError::Transaction("rollback without begin".to_string()))?;
        self.tables = snapshot;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: i64, event: i64, item: &str) -> StagedRow {
        StagedRow::from_pairs([
            ("cdr_skey", StageValue::Integer(key)),
            ("ck_event_id", StageValue::Integer(event)),
            ("item_nm", StageValue::text(item)),
        ])
    }

    fn row(key: i64, event: i64) -> StagedRow {
        item(key, event, "AETERM")
    }

    fn upsert(row: StagedRow) -> Statement {
        Statement::Upsert {
            table: StageTable::Active,
            conflict_columns: vec!["cdr_skey".to_string(), "item_nm".to_string()],
            row,
        }
    }

    #[test]
    fn test_upsert_replaces_same_identity() {
        let mut gateway = MemoryGateway::new();
        gateway.execute(&upsert(row(42, 7))).unwrap();
        gateway.execute(&upsert(row(42, 8))).unwrap();
        gateway.execute(&upsert(row(43, 1))).unwrap();

        let active = gateway.rows(StageTable::Active);
        assert_eq!(active.len(), 2);
        assert!(active.contains(&row(42, 8)));
    }

    #[test]
    fn test_upsert_keeps_items_sharing_identity() {
        let mut gateway = MemoryGateway::new();
        for name in ["AETERM", "AESEV", "AEOUT"] {
            gateway.execute(&upsert(item(42, 7, name))).unwrap();
        }
        gateway.execute(&upsert(item(42, 8, "AESEV"))).unwrap();

        let active = gateway.rows(StageTable::Active);
        assert_eq!(active.len(), 3);
        assert!(active.contains(&item(42, 8, "AESEV")));
        assert!(!active.contains(&item(42, 7, "AESEV")));
    }

    #[test]
    fn test_absent_conflict_value_never_replaces() {
        let mut gateway = MemoryGateway::new();
        let partial = StagedRow::from_pairs([("cdr_skey", "42"), ("item_nm", "null")]);
        gateway.execute(&upsert(partial.clone())).unwrap();
        gateway.execute(&upsert(partial)).unwrap();
        assert_eq!(gateway.rows(StageTable::Active).len(), 2);
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let mut gateway = MemoryGateway::with_rows(vec![row(42, 7)], Vec::new());
        gateway.begin().unwrap();
        let removed = gateway
            .execute(&Statement::DeleteByIdentity {
                table: StageTable::Active,
                identity_column: "cdr_skey".to_string(),
                key: StageValue::Integer(42),
            })
            .unwrap();
        assert_eq!(removed, 1);
        gateway.rollback().unwrap();
        assert_eq!(gateway.rows(StageTable::Active).len(), 1);
        assert!(!gateway.in_transaction());
    }

    #[test]
    fn test_transaction_misuse() {
        let mut gateway = MemoryGateway::new();
        assert!(gateway.commit().is_err());
        gateway.begin().unwrap();
        assert!(matches!(gateway.begin(), Err(GatewayError::Transaction(_))));
    }

    #[test]
    fn test_failing_table() {
        let mut gateway = MemoryGateway::new();
        gateway.fail_writes_to(StageTable::Active);
        assert!(gateway.execute(&upsert(row(1, 1))).is_err());
        assert!(gateway.rows(StageTable::Active).is_empty());
    }
}
