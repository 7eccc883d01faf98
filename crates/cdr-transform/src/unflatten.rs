//! Wide-to-long unflattening of domain extracts.
//!
//! A wide extract holds one row per subject/visit/form instance and one
//! column per item. Unflattening emits one question/answer row per
//! (source row, item column), with the identifier columns replicated onto
//! every record.
//!
//! The pivot is done in bulk: a row-index plan is built subject by subject,
//! the identifier columns are replicated with a single `take`, and the
//! question/answer columns are assembled as flat vectors.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use cdr_common::{any_to_string, any_to_text};
use cdr_model::{
    DomainExtract, Issue, IssueKind, IssueSink, ItemAnswerRecord, NULL_SENTINEL, PipelineConfig,
    SourceColumns, TIMESTAMP_FORMAT,
};

use crate::cancel::CancelFlag;
use crate::error::{Result, TransformError};

/// Column holding the item column name in the long frame.
pub const QUESTION_COLUMN: &str = "QUESTION";
/// Column holding the rendered cell value in the long frame.
pub const ANSWER_COLUMN: &str = "ANSWER";
/// Column holding the domain name in the long frame.
pub const DOMAIN_COLUMN: &str = "DOMAIN";
/// Column holding the creation timestamp of each record.
pub const CREATED_COLUMN: &str = "created_dt";

/// Long-form output for one domain.
#[derive(Debug, Clone)]
pub struct UnflattenedDomain {
    /// Raw label of the extract this came from.
    pub domain_label: String,
    /// Canonical domain name, e.g. `AE`.
    pub domain_name: String,
    /// One row per (source row, item column), renamed per configuration.
    pub frame: DataFrame,
    pub item_columns: Vec<String>,
    pub subject_count: usize,
    /// Source rows pivoted (after sampling).
    pub source_rows: usize,
    pub created_at: NaiveDateTime,
    subject_column: String,
    question_column: String,
    answer_column: String,
}

impl UnflattenedDomain {
    pub fn record_count(&self) -> usize {
        self.frame.height()
    }

    /// Name of the subject column in [`UnflattenedDomain::frame`].
    pub fn subject_column(&self) -> &str {
        &self.subject_column
    }

    /// Lazily walk the long frame as [`ItemAnswerRecord`]s.
    pub fn records(&self) -> Result<impl Iterator<Item = ItemAnswerRecord> + '_> {
        let subjects = self.column(&self.subject_column)?;
        let questions = self.column(&self.question_column)?;
        let answers = self.column(&self.answer_column)?;
        Ok((0..self.frame.height()).map(move |idx| ItemAnswerRecord {
            subject_id: any_to_string(subjects.get(idx).unwrap_or(AnyValue::Null)),
            domain_name: self.domain_name.clone(),
            question: any_to_string(questions.get(idx).unwrap_or(AnyValue::Null)),
            answer: any_to_text(answers.get(idx).unwrap_or(AnyValue::Null)),
            created_at: self.created_at,
        }))
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.frame
            .column(name)
            .map_err(|_| TransformError::ColumnNotFound(name.to_string()))
    }
}

/// Split of an extract's columns into replicated and pivoted ones.
#[derive(Debug)]
struct ColumnLayout {
    base: Vec<String>,
    items: Vec<String>,
}

impl ColumnLayout {
    fn of(df: &DataFrame, base_cols: &BTreeSet<&str>) -> Self {
        let (base, items): (Vec<String>, Vec<String>) = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .partition(|name| base_cols.contains(name.as_str()));
        Self { base, items }
    }
}

/// Pivots wide extracts into long question/answer frames.
pub struct Unflattener<'a> {
    config: &'a PipelineConfig,
    columns: SourceColumns,
    created_at: NaiveDateTime,
    cancel: CancelFlag,
}

impl<'a> Unflattener<'a> {
    /// `created_at` is stamped on every record produced.
    pub fn new(config: &'a PipelineConfig, created_at: NaiveDateTime) -> Self {
        Self {
            config,
            columns: config.source_columns(),
            created_at,
            cancel: CancelFlag::default(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Unflatten one extract.
    ///
    /// Returns `Ok(None)` when the domain is skipped; the reason is reported
    /// to `sink`. The audit-action column, when present, is carried through
    /// unpivoted so records can be routed afterwards.
    pub fn unflatten(
        &self,
        extract: &DomainExtract,
        domain_name: &str,
        sink: &mut dyn IssueSink,
    ) -> Result<Option<UnflattenedDomain>> {
        self.cancel.check()?;
        let label = extract.domain_label.as_str();
        let subject = self.columns.subject.as_str();

        if extract.row_count() == 0 {
            sink.report(Issue::new(
                IssueKind::EmptyExtract,
                label,
                format!("{label} has no records, skipping"),
            ));
            return Ok(None);
        }
        if !extract.has_column(subject) {
            sink.report(
                Issue::new(
                    IssueKind::MissingRequiredColumn,
                    label,
                    format!("subject column {subject} not in {label}, skipping"),
                )
                .with_column(subject),
            );
            return Ok(None);
        }
        if !self.config.is_needed(domain_name) {
            sink.report(Issue::new(
                IssueKind::DomainNotInAllowList,
                label,
                format!("{domain_name} is not in the needed domains, skipping {label}"),
            ));
            return Ok(None);
        }

        let mut base_set: BTreeSet<&str> =
            self.config.base_cols.iter().map(String::as_str).collect();
        base_set.insert(subject);
        base_set.insert(self.columns.audit_action.as_str());
        let layout = ColumnLayout::of(&extract.data, &base_set);
        if layout.items.is_empty() {
            sink.report(Issue::new(
                IssueKind::NoItemColumns,
                label,
                format!("{label} has no item columns, skipping"),
            ));
            return Ok(None);
        }

        let mut frame = extract.data.clone();
        if let Some(limit) = self.config.sample_limit
            && frame.height() > limit
        {
            frame = self.sample(&frame, limit, label)?;
        }
        self.stringify_last_modified(&mut frame, label, sink);

        let (long, subject_count) = self.pivot(&frame, &layout, domain_name, label, sink)?;
        let (long, kept) = self.rename(long, label)?;
        let present = |source: &str| -> String {
            if kept.contains(source) {
                source.to_string()
            } else {
                self.config.renamed(source).to_string()
            }
        };

        tracing::info!(
            domain = %label,
            domain_name,
            subjects = subject_count,
            items = layout.items.len(),
            records = long.height(),
            "unflattened domain"
        );

        Ok(Some(UnflattenedDomain {
            domain_label: label.to_string(),
            domain_name: domain_name.to_string(),
            frame: long,
            item_columns: layout.items,
            subject_count,
            source_rows: frame.height(),
            created_at: self.created_at,
            subject_column: present(subject),
            question_column: present(QUESTION_COLUMN),
            answer_column: present(ANSWER_COLUMN),
        }))
    }

    /// Uniform random subset of `limit` rows, in source order.
    fn sample(&self, frame: &DataFrame, limit: usize, label: &str) -> Result<DataFrame> {
        let height = frame.height();
        let mut picked = match self.config.sample_seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                rand::seq::index::sample(&mut rng, height, limit).into_vec()
            }
            None => {
                tracing::warn!(
                    domain = %label,
                    "sampling without sample_seed, row selection is not reproducible"
                );
                rand::seq::index::sample(&mut rand::thread_rng(), height, limit).into_vec()
            }
        };
        picked.sort_unstable();
        tracing::debug!(domain = %label, rows = height, limit, "sampled extract");
        let idx = IdxCa::from_vec(
            "sample".into(),
            picked.into_iter().map(|row| row as IdxSize).collect(),
        );
        Ok(frame.take(&idx)?)
    }

    /// Render the last-modified column as text with `"null"` for blanks.
    ///
    /// Failure leaves the column untouched and is only a warning.
    fn stringify_last_modified(&self, frame: &mut DataFrame, label: &str, sink: &mut dyn IssueSink) {
        let name = self.columns.last_modified.as_str();
        let Ok(column) = frame.column(name) else {
            tracing::debug!(domain = %label, column = name, "no last-modified column");
            return;
        };
        let values = (0..column.len())
            .map(|idx| {
                column
                    .get(idx)
                    .map(|value| any_to_text(value).unwrap_or_else(|| NULL_SENTINEL.to_string()))
            })
            .collect::<PolarsResult<Vec<String>>>();
        let result = values
            .and_then(|values| frame.with_column(Column::new(name.into(), values)).map(|_| ()));
        if let Err(err) = result {
            sink.report(
                Issue::new(
                    IssueKind::UnreadableLastModified,
                    label,
                    format!("values in {name} cannot be processed: {err}"),
                )
                .with_column(name),
            );
        }
    }

    fn pivot(
        &self,
        frame: &DataFrame,
        layout: &ColumnLayout,
        domain_name: &str,
        label: &str,
        sink: &mut dyn IssueSink,
    ) -> Result<(DataFrame, usize)> {
        let height = frame.height();
        let subject_name = self.columns.subject.as_str();
        let subjects = frame.column(subject_name)?;

        // Subjects in order of first appearance, each with its source rows.
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut missing_subject = 0u64;
        for row in 0..height {
            match any_to_text(subjects.get(row)?) {
                Some(subject) if !subject.trim().is_empty() => {
                    let slot = *positions.entry(subject).or_insert_with(|| {
                        groups.push(Vec::new());
                        groups.len() - 1
                    });
                    groups[slot].push(row);
                }
                _ => missing_subject += 1,
            }
        }
        if missing_subject > 0 {
            sink.report(
                Issue::new(
                    IssueKind::MissingSubjectId,
                    label,
                    format!("{missing_subject} rows without a subject id were dropped"),
                )
                .with_column(subject_name)
                .with_count(missing_subject),
            );
        }

        let answers_by_item = layout
            .items
            .iter()
            .map(|name| {
                let column = frame.column(name)?;
                (0..height)
                    .map(|row| column.get(row).map(any_to_text))
                    .collect::<PolarsResult<Vec<Option<String>>>>()
            })
            .collect::<PolarsResult<Vec<_>>>()?;

        let total = groups.iter().map(Vec::len).sum::<usize>() * layout.items.len();
        let mut take: Vec<IdxSize> = Vec::with_capacity(total);
        let mut questions: Vec<&str> = Vec::with_capacity(total);
        let mut answers: Vec<Option<String>> = Vec::with_capacity(total);
        for rows in &groups {
            self.cancel.check()?;
            for &row in rows {
                for (item, name) in layout.items.iter().enumerate() {
                    take.push(row as IdxSize);
                    questions.push(name);
                    answers.push(answers_by_item[item][row].clone());
                }
            }
        }

        let idx = IdxCa::from_vec("plan".into(), take);
        let mut long = frame
            .select(layout.base.iter().map(String::as_str))?
            .take(&idx)?;
        let created = self.created_at.format(TIMESTAMP_FORMAT).to_string();
        long.with_column(Column::new(QUESTION_COLUMN.into(), questions))?;
        long.with_column(Column::new(ANSWER_COLUMN.into(), answers))?;
        long.with_column(Column::new(CREATED_COLUMN.into(), vec![created; total]))?;
        long.with_column(Column::new(
            DOMAIN_COLUMN.into(),
            vec![domain_name.to_string(); total],
        ))?;
        Ok((long, groups.len()))
    }

    /// Apply `rename_columns`. Returns the frame and the source columns that
    /// kept their name because the target was already taken.
    fn rename<'c>(
        &'c self,
        mut long: DataFrame,
        label: &str,
    ) -> Result<(DataFrame, BTreeSet<&'c str>)> {
        let mut kept = BTreeSet::new();
        for (from, to) in &self.config.rename_columns {
            if from == to || long.column(from).is_err() {
                continue;
            }
            if long.column(to).is_ok() {
                tracing::warn!(
                    domain = %label,
                    from = %from,
                    to = %to,
                    "rename target already present, column kept as is"
                );
                kept.insert(from.as_str());
                continue;
            }
            long.rename(from, to.as_str().into())?;
        }
        Ok((long, kept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn created() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            base_cols: vec!["Subject".to_string(), "Visit".to_string()],
            needed_domains: vec!["AE".to_string()],
            rename_columns: Default::default(),
            ..PipelineConfig::default()
        }
    }

    fn ae_extract() -> DomainExtract {
        let df = DataFrame::new(vec![
            Column::new("Subject".into(), ["001", "002", "001"]),
            Column::new("Visit".into(), ["V1", "V1", "V2"]),
            Column::new("Q1".into(), [Some("a"), Some("b"), None]),
            Column::new("Q2".into(), [1i64, 2, 3]),
        ])
        .unwrap();
        DomainExtract::new("sm_ae201", df)
    }

    #[test]
    fn test_records_grouped_by_subject() {
        let config = config();
        let mut issues: Vec<Issue> = Vec::new();
        let out = Unflattener::new(&config, created())
            .unflatten(&ae_extract(), "AE", &mut issues)
            .unwrap()
            .unwrap();

        assert_eq!(out.record_count(), 6);
        assert_eq!(out.subject_count, 2);
        assert_eq!(out.item_columns, vec!["Q1", "Q2"]);

        let records: Vec<_> = out.records().unwrap().collect();
        let subjects: Vec<_> = records.iter().map(|r| r.subject_id.as_str()).collect();
        assert_eq!(subjects, vec!["001", "001", "001", "001", "002", "002"]);
        let questions: Vec<_> = records.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(questions, vec!["Q1", "Q2", "Q1", "Q2", "Q1", "Q2"]);
        assert_eq!(records[2].answer, None);
        assert_eq!(records[3].answer.as_deref(), Some("3"));
        assert!(records.iter().all(|r| r.domain_name == "AE"));
        assert!(records.iter().all(|r| r.created_at == created()));
        assert!(issues.is_empty());
    }

    #[test]
    fn test_base_columns_replicated() {
        let config = config();
        let out = Unflattener::new(&config, created())
            .unflatten(&ae_extract(), "AE", &mut Vec::<Issue>::new())
            .unwrap()
            .unwrap();
        let visits = out.frame.column("Visit").unwrap();
        let visits: Vec<_> = (0..visits.len())
            .map(|idx| any_to_string(visits.get(idx).unwrap()))
            .collect();
        assert_eq!(visits, vec!["V1", "V1", "V2", "V2", "V1", "V1"]);
    }

    #[test]
    fn test_not_needed_domain_is_skipped() {
        let config = config();
        let mut issues: Vec<Issue> = Vec::new();
        let out = Unflattener::new(&config, created())
            .unflatten(&ae_extract(), "CM", &mut issues)
            .unwrap();
        assert!(out.is_none());
        assert_eq!(issues[0].kind, IssueKind::DomainNotInAllowList);
    }

    #[test]
    fn test_missing_subject_column_is_skipped() {
        let mut config = config();
        config.columns.subject = Some("SUBJID".to_string());
        let mut issues: Vec<Issue> = Vec::new();
        let out = Unflattener::new(&config, created())
            .unflatten(&ae_extract(), "AE", &mut issues)
            .unwrap();
        assert!(out.is_none());
        assert_eq!(issues[0].kind, IssueKind::MissingRequiredColumn);
        assert_eq!(issues[0].column.as_deref(), Some("SUBJID"));
    }

    #[test]
    fn test_no_item_columns_is_skipped() {
        let config = config();
        let df = DataFrame::new(vec![
            Column::new("Subject".into(), ["001"]),
            Column::new("Visit".into(), ["V1"]),
        ])
        .unwrap();
        let mut issues: Vec<Issue> = Vec::new();
        let out = Unflattener::new(&config, created())
            .unflatten(&DomainExtract::new("sm_ae", df), "AE", &mut issues)
            .unwrap();
        assert!(out.is_none());
        assert_eq!(issues[0].kind, IssueKind::NoItemColumns);
    }

    #[test]
    fn test_audit_column_is_not_pivoted() {
        let config = config();
        let df = DataFrame::new(vec![
            Column::new("Subject".into(), ["001"]),
            Column::new("AUDIT_ACTION".into(), ["D"]),
            Column::new("Q1".into(), ["x"]),
        ])
        .unwrap();
        let out = Unflattener::new(&config, created())
            .unflatten(&DomainExtract::new("sm_ae", df), "AE", &mut Vec::<Issue>::new())
            .unwrap()
            .unwrap();
        assert_eq!(out.record_count(), 1);
        assert!(out.frame.column("AUDIT_ACTION").is_ok());
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let mut config = config();
        config.sample_limit = Some(2);
        config.sample_seed = Some(42);
        let subjects: Vec<String> = (0..20).map(|idx| format!("{idx:03}")).collect();
        let df = DataFrame::new(vec![
            Column::new("Subject".into(), subjects),
            Column::new("Q1".into(), (0..20i64).collect::<Vec<_>>()),
        ])
        .unwrap();
        let extract = DomainExtract::new("sm_ae", df);

        let run = || {
            let out = Unflattener::new(&config, created())
                .unflatten(&extract, "AE", &mut Vec::<Issue>::new())
                .unwrap()
                .unwrap();
            out.records()
                .unwrap()
                .map(|r| r.subject_id)
                .collect::<Vec<_>>()
        };
        let first = run();
        assert_eq!(first.len(), 2);
        assert!(first[0] < first[1]);
        assert_eq!(first, run());
    }

    #[test]
    fn test_cancelled_run_yields_nothing() {
        let config = config();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = Unflattener::new(&config, created())
            .with_cancel(cancel)
            .unflatten(&ae_extract(), "AE", &mut Vec::<Issue>::new());
        assert!(matches!(result, Err(TransformError::Cancelled)));
    }

    #[test]
    fn test_rename_applied_after_pivot() {
        let mut config = config();
        config.rename_columns = [("Subject", "subjid"), ("QUESTION", "item_nm")]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        let out = Unflattener::new(&config, created())
            .unflatten(&ae_extract(), "AE", &mut Vec::<Issue>::new())
            .unwrap()
            .unwrap();
        assert!(out.frame.column("subjid").is_ok());
        assert!(out.frame.column("item_nm").is_ok());
        assert_eq!(out.subject_column(), "subjid");
        assert_eq!(out.records().unwrap().count(), 6);
    }

    #[test]
    fn test_blocked_rename_keeps_reading_the_subject() {
        let mut config = config();
        config.base_cols.push("subjid".to_string());
        config.rename_columns = [("Subject", "subjid")]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        let df = DataFrame::new(vec![
            Column::new("Subject".into(), ["001", "002"]),
            Column::new("subjid".into(), ["legacy-1", "legacy-2"]),
            Column::new("Visit".into(), ["V1", "V1"]),
            Column::new("Q1".into(), ["a", "b"]),
        ])
        .unwrap();
        let out = Unflattener::new(&config, created())
            .unflatten(&DomainExtract::new("sm_ae201", df), "AE", &mut Vec::<Issue>::new())
            .unwrap()
            .unwrap();

        assert_eq!(out.subject_column(), "Subject");
        let subjects: Vec<_> = out.records().unwrap().map(|r| r.subject_id).collect();
        assert_eq!(subjects, vec!["001", "002"]);
    }
}
