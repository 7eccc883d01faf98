//! Wide input tables and the long-form records produced from them.

use chrono::NaiveDateTime;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// One raw domain table as exported by the source EDC system.
///
/// Wide format: one row per subject/visit/form instance, one column per item.
#[derive(Debug, Clone)]
pub struct DomainExtract {
    /// Raw domain label, e.g. `sm_ae201`.
    pub domain_label: String,
    /// Table contents.
    pub data: DataFrame,
}

impl DomainExtract {
    pub fn new(domain_label: impl Into<String>, data: DataFrame) -> Self {
        Self {
            domain_label: domain_label.into(),
            data,
        }
    }

    /// Returns the number of source rows.
    pub fn row_count(&self) -> usize {
        self.data.height()
    }

    /// Column names in source order.
    pub fn column_names(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.column(name).is_ok()
    }
}

/// A single question/answer pair for one subject.
///
/// This is the atomic output unit of the unflattening step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAnswerRecord {
    pub subject_id: String,
    pub domain_name: String,
    /// Name of the item column the answer came from.
    pub question: String,
    /// Cell value rendered as text; `None` for an empty cell.
    pub answer: Option<String>,
    pub created_at: NaiveDateTime,
}
