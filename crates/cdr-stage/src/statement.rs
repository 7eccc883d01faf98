//! Staging statements.
//!
//! A [`Statement`] is the unit of work handed to a [`StagingGateway`]. SQL
//! backends render it with [`Statement::sql`] and bind
//! [`Statement::parameters`] positionally; the in-memory and CSV gateways
//! interpret it directly.
//!
//! [`StagingGateway`]: crate::StagingGateway

use cdr_model::{StageTable, StageValue, StagedRow};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Insert, replacing any row that matches on every conflict column.
    Upsert {
        table: StageTable,
        conflict_columns: Vec<String>,
        row: StagedRow,
    },
    /// Plain insert.
    Insert { table: StageTable, row: StagedRow },
    /// All rows whose identity column equals `key`.
    SelectByIdentity {
        table: StageTable,
        identity_column: String,
        key: StageValue,
    },
    /// Remove all rows whose identity column equals `key`.
    DeleteByIdentity {
        table: StageTable,
        identity_column: String,
        key: StageValue,
    },
}

impl Statement {
    pub fn table(&self) -> StageTable {
        match self {
            Self::Upsert { table, .. }
            | Self::Insert { table, .. }
            | Self::SelectByIdentity { table, .. }
            | Self::DeleteByIdentity { table, .. } => *table,
        }
    }

    /// The row an insert or upsert writes.
    pub fn row(&self) -> Option<&StagedRow> {
        match self {
            Self::Upsert { row, .. } | Self::Insert { row, .. } => Some(row),
            Self::SelectByIdentity { .. } | Self::DeleteByIdentity { .. } => None,
        }
    }

    /// Render as parameterized Postgres SQL against `schema`.
    pub fn sql(&self, schema: &str) -> String {
        let table = self.table().qualified(schema);
        match self {
            Self::Insert { row, .. } => insert_sql(&table, row),
            Self::Upsert {
                conflict_columns,
                row,
                ..
            } => {
                let mut sql = insert_sql(&table, row);
                let target: Vec<String> = conflict_columns
                    .iter()
                    .map(|column| quote_ident(column))
                    .collect();
                let target = target.join(", ");
                let updates: Vec<String> = row
                    .columns()
                    .iter()
                    .filter(|column| !conflict_columns.contains(column))
                    .map(|column| {
                        let column = quote_ident(column);
                        format!("{column} = EXCLUDED.{column}")
                    })
                    .collect();
                if updates.is_empty() {
                    sql.push_str(&format!(" ON CONFLICT ({target}) DO NOTHING"));
                } else {
                    sql.push_str(&format!(
                        " ON CONFLICT ({target}) DO UPDATE SET {}",
                        updates.join(", ")
                    ));
                }
                sql
            }
            Self::SelectByIdentity {
                identity_column, ..
            } => format!(
                "SELECT * FROM {table} WHERE {} = $1",
                quote_ident(identity_column)
            ),
            Self::DeleteByIdentity {
                identity_column, ..
            } => format!(
                "DELETE FROM {table} WHERE {} = $1",
                quote_ident(identity_column)
            ),
        }
    }

    /// Positional parameters for [`Statement::sql`].
    ///
    /// Identity keys are bound as the value read from the staged row, so a
    /// numeric key stays numeric.
    pub fn parameters(&self) -> Vec<StageValue> {
        match self {
            Self::Upsert { row, .. } | Self::Insert { row, .. } => row.values().to_vec(),
            Self::SelectByIdentity { key, .. } | Self::DeleteByIdentity { key, .. } => {
                vec![key.clone()]
            }
        }
    }
}

fn insert_sql(table: &str, row: &StagedRow) -> String {
    let columns: Vec<String> = row.columns().iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|idx| format!("${idx}")).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Quote an identifier unless it is a plain lowercase name.
fn quote_ident(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> StagedRow {
        StagedRow::from_pairs([
            ("cdr_skey", StageValue::Integer(42)),
            ("ck_event_id", StageValue::Integer(7)),
            ("item_nm", StageValue::text("AETERM")),
            ("item_value", StageValue::text("Headache")),
        ])
    }

    fn conflict() -> Vec<String> {
        vec!["cdr_skey".to_string(), "item_nm".to_string()]
    }

    #[test]
    fn test_upsert_sql() {
        let stmt = Statement::Upsert {
            table: StageTable::Active,
            conflict_columns: conflict(),
            row: row(),
        };
        insta::assert_snapshot!(
            stmt.sql("STUDY01"),
            @"INSERT INTO study01.stg_pred (cdr_skey, ck_event_id, item_nm, item_value) VALUES ($1, $2, $3, $4) ON CONFLICT (cdr_skey, item_nm) DO UPDATE SET ck_event_id = EXCLUDED.ck_event_id, item_value = EXCLUDED.item_value"
        );
        assert_eq!(stmt.parameters().len(), 4);
        assert_eq!(stmt.row(), Some(&row()));
    }

    #[test]
    fn test_upsert_of_key_only_row_does_nothing_on_conflict() {
        let stmt = Statement::Upsert {
            table: StageTable::Active,
            conflict_columns: conflict(),
            row: StagedRow::from_pairs([("cdr_skey", "1"), ("item_nm", "AETERM")]),
        };
        insta::assert_snapshot!(
            stmt.sql("cdr"),
            @"INSERT INTO cdr.stg_pred (cdr_skey, item_nm) VALUES ($1, $2) ON CONFLICT (cdr_skey, item_nm) DO NOTHING"
        );
    }

    #[test]
    fn test_select_and_delete_sql() {
        let select = Statement::SelectByIdentity {
            table: StageTable::Active,
            identity_column: "cdr_skey".to_string(),
            key: StageValue::Integer(42),
        };
        let delete = Statement::DeleteByIdentity {
            table: StageTable::Active,
            identity_column: "cdr_skey".to_string(),
            key: StageValue::Integer(42),
        };
        insta::assert_snapshot!(select.sql("cdr"), @"SELECT * FROM cdr.stg_pred WHERE cdr_skey = $1");
        insta::assert_snapshot!(delete.sql("cdr"), @"DELETE FROM cdr.stg_pred WHERE cdr_skey = $1");
        assert_eq!(select.parameters(), vec![StageValue::Integer(42)]);
        assert_eq!(delete.row(), None);
    }

    #[test]
    fn test_insert_quotes_mixed_case_columns() {
        let stmt = Statement::Insert {
            table: StageTable::Deleted,
            row: StagedRow::from_pairs([("StudySiteId", "1"), ("status", "D")]),
        };
        insta::assert_snapshot!(
            stmt.sql("cdr"),
            @r#"INSERT INTO cdr.stg_pred_del ("StudySiteId", status) VALUES ($1, $2)"#
        );
    }
}
