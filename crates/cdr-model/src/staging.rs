//! Staged rows and events bound for the warehouse staging tables.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::{STG_PRED, STG_PRED_DEL};

/// Literal placeholder written for values that are missing or not a number.
pub const NULL_SENTINEL: &str = "null";

/// Timestamp rendering used for staged values and CSV snapshots.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// The two staging destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageTable {
    /// `<schema>.stg_pred`: active, upserted rows.
    Active,
    /// `<schema>.stg_pred_del`: rows superseded by a deletion.
    Deleted,
}

impl StageTable {
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Active => STG_PRED,
            Self::Deleted => STG_PRED_DEL,
        }
    }

    /// Schema-qualified table name, lowercased like the warehouse expects.
    pub fn qualified(self, schema: &str) -> String {
        format!("{}.{}", schema.trim().to_lowercase(), self.table_name())
    }
}

impl fmt::Display for StageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A single staged cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
}

impl StageValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// The `"null"` sentinel as a text value.
    pub fn null_sentinel() -> Self {
        Self::Text(NULL_SENTINEL.to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for real nulls, blank text and the `"null"` sentinel.
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(value) => {
                let trimmed = value.trim();
                trimmed.is_empty() || trimmed == NULL_SENTINEL
            }
            Self::Float(value) => !value.is_finite(),
            Self::Integer(_) | Self::Timestamp(_) => false,
        }
    }

    /// Text rendering used for CSV output and SQL parameters.
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => {
                if value.is_finite() && value.fract() == 0.0 {
                    format!("{value:.0}")
                } else {
                    value.to_string()
                }
            }
            Self::Timestamp(value) => value.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for StageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for StageValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StageValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for StageValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<NaiveDateTime> for StageValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

/// Ordered column to value mapping.
///
/// Rows produced from the same frame share one column list.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRow {
    columns: Arc<[String]>,
    values: Vec<StageValue>,
}

impl StagedRow {
    /// Build a row; missing trailing values are padded with nulls and extra
    /// values are dropped so that columns and values always line up.
    pub fn new(columns: Arc<[String]>, mut values: Vec<StageValue>) -> Self {
        values.resize(columns.len(), StageValue::Null);
        Self { columns, values }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<StageValue>,
    {
        let (columns, values): (Vec<String>, Vec<StageValue>) = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .unzip();
        Self::new(columns.into(), values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn shared_columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    pub fn values(&self) -> &[StageValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn get(&self, column: &str) -> Option<&StageValue> {
        self.position(column).map(|idx| &self.values[idx])
    }

    /// Overwrite an existing column; returns false when the column is absent.
    pub fn set(&mut self, column: &str, value: StageValue) -> bool {
        match self.position(column) {
            Some(idx) => {
                self.values[idx] = value;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StageValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Re-shape the row onto another column list; absent columns become null.
    pub fn project(&self, columns: &Arc<[String]>) -> Self {
        let values = columns
            .iter()
            .map(|name| self.get(name).cloned().unwrap_or(StageValue::Null))
            .collect();
        Self::new(Arc::clone(columns), values)
    }

    /// Identity key stored in `column`, if any.
    pub fn identity(&self, column: &str) -> Option<IdentityKey> {
        self.get(column).and_then(IdentityKey::from_value)
    }
}

/// Identity of a staged event (`cdr_skey`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    /// Read a key from a staged value; absent values carry no identity.
    pub fn from_value(value: &StageValue) -> Option<Self> {
        if value.is_absent() {
            return None;
        }
        Some(Self::new(value.render()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a staged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Deleted,
}

impl EventStatus {
    /// Code written into the status column.
    pub fn code(self) -> &'static str {
        match self {
            Self::Active => "A",
            Self::Deleted => "D",
        }
    }
}

/// A row in one of the staging tables, with its routing fields pulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedEvent {
    pub identity_key: Option<IdentityKey>,
    pub event_id: StageValue,
    pub status: EventStatus,
    pub payload: StagedRow,
}

impl StagedEvent {
    pub fn from_row(
        payload: StagedRow,
        identity_column: &str,
        event_id_column: &str,
        status: EventStatus,
    ) -> Self {
        Self {
            identity_key: payload.identity(identity_column),
            event_id: payload
                .get(event_id_column)
                .cloned()
                .unwrap_or(StageValue::Null),
            status,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_pads_missing_values() {
        let columns: Arc<[String]> = vec!["a".to_string(), "b".to_string()].into();
        let row = StagedRow::new(columns, vec![StageValue::text("x")]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("b"), Some(&StageValue::Null));
    }

    #[test]
    fn test_project_reorders_and_fills() {
        let row = StagedRow::from_pairs([("b", "2"), ("a", "1")]);
        let target: Arc<[String]> = vec!["a".to_string(), "c".to_string()].into();
        let projected = row.project(&target);
        assert_eq!(projected.columns(), &["a".to_string(), "c".to_string()]);
        assert_eq!(projected.values(), &[StageValue::text("1"), StageValue::Null]);
    }

    #[test]
    fn test_identity_key_from_values() {
        assert_eq!(
            IdentityKey::from_value(&StageValue::Integer(42)),
            Some(IdentityKey::new("42"))
        );
        assert_eq!(
            IdentityKey::from_value(&StageValue::Float(42.0)),
            Some(IdentityKey::new("42"))
        );
        assert_eq!(
            IdentityKey::from_value(&StageValue::text(" 42 ")),
            Some(IdentityKey::new("42"))
        );
        assert_eq!(IdentityKey::from_value(&StageValue::null_sentinel()), None);
        assert_eq!(IdentityKey::from_value(&StageValue::Null), None);
    }

    #[test]
    fn test_qualified_table_name() {
        assert_eq!(StageTable::Active.qualified("STUDY01"), "study01.stg_pred");
        assert_eq!(StageTable::Deleted.qualified("cdr"), "cdr.stg_pred_del");
    }

    #[test]
    fn test_event_from_row() {
        let row = StagedRow::from_pairs([
            ("cdr_skey", StageValue::Integer(42)),
            ("ck_event_id", StageValue::Integer(7)),
        ]);
        let event = StagedEvent::from_row(row, "cdr_skey", "ck_event_id", EventStatus::Active);
        assert_eq!(event.identity_key, Some(IdentityKey::new("42")));
        assert_eq!(event.event_id, StageValue::Integer(7));
    }
}
