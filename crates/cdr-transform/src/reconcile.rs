//! Conforming long-frame rows to a staging table's column list.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use polars::prelude::*;

use cdr_common::{any_to_f64, format_numeric, is_missing_text};
use cdr_model::{Issue, IssueKind, IssueSink, PipelineConfig, StageValue, StagedRow};

use crate::datetime::{parse_timestamp, sentinel_timestamp};
use crate::error::Result;

/// Convert a Polars cell into a staged value.
fn stage_value(value: AnyValue<'_>) -> StageValue {
    match value {
        AnyValue::Null => StageValue::Null,
        AnyValue::Int8(v) => StageValue::Integer(i64::from(v)),
        AnyValue::Int16(v) => StageValue::Integer(i64::from(v)),
        AnyValue::Int32(v) => StageValue::Integer(i64::from(v)),
        AnyValue::Int64(v) => StageValue::Integer(v),
        AnyValue::UInt8(v) => StageValue::Integer(i64::from(v)),
        AnyValue::UInt16(v) => StageValue::Integer(i64::from(v)),
        AnyValue::UInt32(v) => StageValue::Integer(i64::from(v)),
        AnyValue::UInt64(v) => {
            i64::try_from(v).map_or_else(|_| StageValue::Text(v.to_string()), StageValue::Integer)
        }
        value @ (AnyValue::Float32(_) | AnyValue::Float64(_)) => {
            any_to_f64(value).map_or(StageValue::Null, StageValue::Float)
        }
        AnyValue::String(s) => StageValue::text(s),
        AnyValue::StringOwned(s) => StageValue::text(s.as_str()),
        AnyValue::Boolean(b) => StageValue::text(b.to_string()),
        other => StageValue::text(other.to_string()),
    }
}

/// Conforms rows to an ordered target column list.
///
/// - a missing timestamp column gets the run start, any other missing
///   column the `"null"` sentinel;
/// - NaN-prone columns turn null/NaN/inf into `"null"` and become text;
/// - the designated timestamp column is parsed, falling back to the
///   sentinel date.
pub struct Reconciler<'a> {
    config: &'a PipelineConfig,
    run_started: NaiveDateTime,
    normalized: HashSet<&'a str>,
}

/// Count of timestamp values that fell back to the sentinel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct TimestampFallbacks(u64);

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a PipelineConfig, run_started: NaiveDateTime) -> Self {
        Self {
            config,
            run_started,
            normalized: config
                .text_normalized_columns
                .iter()
                .map(String::as_str)
                .collect(),
        }
    }

    /// Reconcile every row of a frame against `target_columns`.
    ///
    /// Sentinel substitutions are reported once, with their count.
    pub fn reconcile(
        &self,
        frame: &DataFrame,
        target_columns: &[String],
        domain_label: &str,
        sink: &mut dyn IssueSink,
    ) -> Result<Vec<StagedRow>> {
        let target: Arc<[String]> = target_columns.iter().cloned().collect();
        let sources: Vec<Option<&Column>> = target
            .iter()
            .map(|name| frame.column(name).ok())
            .collect();

        let missing: Vec<&str> = target
            .iter()
            .zip(&sources)
            .filter(|(_, source)| source.is_none())
            .map(|(name, _)| name.as_str())
            .collect();
        if !missing.is_empty() {
            tracing::debug!(domain = %domain_label, ?missing, "filling absent target columns");
        }

        let mut fallbacks = TimestampFallbacks::default();
        let mut rows = Vec::with_capacity(frame.height());
        for idx in 0..frame.height() {
            let mut values = Vec::with_capacity(target.len());
            for (name, source) in target.iter().zip(&sources) {
                let value = match source {
                    Some(column) => Some(stage_value(column.get(idx)?)),
                    None => None,
                };
                values.push(self.conform(name, value, &mut fallbacks));
            }
            rows.push(StagedRow::new(Arc::clone(&target), values));
        }

        if fallbacks.0 > 0
            && let Some(column) = self.config.parse_timestamp_column.as_deref()
        {
            sink.report(
                Issue::new(
                    IssueKind::UnparseableTimestamp,
                    domain_label,
                    format!(
                        "{} values in {column} could not be parsed, using {}",
                        fallbacks.0,
                        sentinel_timestamp()
                    ),
                )
                .with_column(column)
                .with_count(fallbacks.0),
            );
        }
        Ok(rows)
    }

    fn conform(
        &self,
        column: &str,
        value: Option<StageValue>,
        fallbacks: &mut TimestampFallbacks,
    ) -> StageValue {
        let mut value = value.unwrap_or_else(|| {
            if self.config.is_timestamp_column(column) {
                StageValue::Timestamp(self.run_started)
            } else {
                StageValue::null_sentinel()
            }
        });
        if self.normalized.contains(column) {
            value = normalize_text(value);
        }
        if self.config.parse_timestamp_column.as_deref() == Some(column) {
            value = parse_value(value, fallbacks);
        }
        value
    }
}

fn normalize_text(value: StageValue) -> StageValue {
    match value {
        StageValue::Null => StageValue::null_sentinel(),
        StageValue::Float(v) if !v.is_finite() => StageValue::null_sentinel(),
        StageValue::Float(v) => StageValue::Text(format_numeric(v)),
        StageValue::Text(s) if s.trim().is_empty() || is_missing_text(&s) => {
            StageValue::null_sentinel()
        }
        StageValue::Text(s) => StageValue::Text(s),
        other => StageValue::Text(other.render()),
    }
}

fn parse_value(value: StageValue, fallbacks: &mut TimestampFallbacks) -> StageValue {
    match value {
        StageValue::Timestamp(ts) => StageValue::Timestamp(ts),
        StageValue::Text(text) => match parse_timestamp(&text) {
            Some(ts) => StageValue::Timestamp(ts),
            None => {
                fallbacks.0 += 1;
                StageValue::Timestamp(sentinel_timestamp())
            }
        },
        _ => {
            fallbacks.0 += 1;
            StageValue::Timestamp(sentinel_timestamp())
        }
    }
}
