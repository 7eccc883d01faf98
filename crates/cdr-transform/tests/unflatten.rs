//! Unflattening whole extracts.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::{Column, DataFrame};
use proptest::prelude::*;

use cdr_model::{DomainExtract, Issue, IssueKind, PipelineConfig};
use cdr_transform::{Unflattener, normalize_domain_label};

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
        rename_columns: BTreeMap::new(),
        ..PipelineConfig::default()
    }
}

#[test]
fn sm_ae201_two_subjects_three_items() {
    let df = DataFrame::new(vec![
        Column::new("Subject".into(), ["S1", "S2"]),
        Column::new("Visit".into(), ["SCREEN", "SCREEN"]),
        Column::new("Q1".into(), ["a", "d"]),
        Column::new("Q2".into(), ["b", "e"]),
        Column::new("Q3".into(), ["c", "f"]),
    ])
    .unwrap();
    let extract = DomainExtract::new("sm_ae201", df);
    let domain_name = normalize_domain_label(&extract.domain_label).unwrap();
    assert_eq!(domain_name, "AE");

    let config = config();
    let mut issues: Vec<Issue> = Vec::new();
    let out = Unflattener::new(&config, created())
        .unflatten(&extract, &domain_name, &mut issues)
        .unwrap()
        .expect("domain is processed");

    let records: Vec<_> = out.records().unwrap().collect();
    assert_eq!(records.len(), 6);
    assert!(records.iter().all(|r| r.domain_name == "AE"));
    assert_eq!(records.iter().filter(|r| r.subject_id == "S1").count(), 3);
    assert_eq!(records.iter().filter(|r| r.subject_id == "S2").count(), 3);
    assert_eq!(records[4].question, "Q2");
    assert_eq!(records[4].answer.as_deref(), Some("e"));
    assert!(issues.is_empty());
}

#[test]
fn empty_extract_is_reported() {
    let df = DataFrame::new(vec![
        Column::new("Subject".into(), Vec::<String>::new()),
        Column::new("Q1".into(), Vec::<String>::new()),
    ])
    .unwrap();
    let config = config();
    let mut issues: Vec<Issue> = Vec::new();
    let out = Unflattener::new(&config, created())
        .unflatten(&DomainExtract::new("sm_ae", df), "AE", &mut issues)
        .unwrap();
    assert!(out.is_none());
    assert_eq!(issues[0].kind, IssueKind::EmptyExtract);
}

#[test]
fn rows_without_subject_are_dropped_and_counted() {
    let df = DataFrame::new(vec![
        Column::new("Subject".into(), [Some("S1"), None, Some(" ")]),
        Column::new("Q1".into(), ["a", "b", "c"]),
    ])
    .unwrap();
    let config = config();
    let mut issues: Vec<Issue> = Vec::new();
    let out = Unflattener::new(&config, created())
        .unflatten(&DomainExtract::new("sm_ae", df), "AE", &mut issues)
        .unwrap()
        .unwrap();
    assert_eq!(out.record_count(), 1);
    assert_eq!(issues[0].kind, IssueKind::MissingSubjectId);
    assert_eq!(issues[0].count, Some(2));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn record_count_is_rows_times_items(
        rows_per_subject in prop::collection::vec(1usize..4, 1..5),
        items in 1usize..5,
    ) {
        let subjects: Vec<String> = rows_per_subject
            .iter()
            .enumerate()
            .flat_map(|(idx, rows)| std::iter::repeat_n(format!("S{idx}"), *rows))
            .collect();
        let height = subjects.len();
        let mut columns = vec![Column::new("Subject".into(), subjects)];
        for item in 0..items {
            columns.push(Column::new(
                format!("Q{item}").as_str().into(),
                vec!["x"; height],
            ));
        }
        let extract = DomainExtract::new("sm_ae", DataFrame::new(columns).unwrap());

        let config = config();
        let out = Unflattener::new(&config, created())
            .unflatten(&extract, "AE", &mut Vec::<Issue>::new())
            .unwrap()
            .unwrap();

        prop_assert_eq!(out.record_count(), height * items);
        prop_assert_eq!(out.subject_count, rows_per_subject.len());
        let records: Vec<_> = out.records().unwrap().collect();
        for (idx, rows) in rows_per_subject.iter().enumerate() {
            let subject = format!("S{idx}");
            let count = records.iter().filter(|r| r.subject_id == subject).count();
            prop_assert_eq!(count, rows * items);
        }
    }
}
