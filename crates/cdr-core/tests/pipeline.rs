//! End-to-end runs over in-memory and on-disk extracts.

use std::collections::BTreeMap;
use std::fs;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::{Column, DataFrame};
use tempfile::TempDir;

use cdr_core::{
    CancelFlag, DomainStatus, RunContext, load_dimensions, load_extracts, run_pipeline,
};
use cdr_model::{
    DimensionMap, DomainExtract, IssueKind, PipelineConfig, RunReport, StageTable, StageValue,
    StagedRow,
};
use cdr_stage::{MemoryGateway, StagingGateway};

fn started() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        needed_domains: vec!["AE".to_string()],
        ..PipelineConfig::default()
    }
}

fn extracts(items: Vec<DomainExtract>) -> BTreeMap<String, DomainExtract> {
    items
        .into_iter()
        .map(|extract| (extract.domain_label.clone(), extract))
        .collect()
}

fn ae_extract() -> DomainExtract {
    let df = DataFrame::new(vec![
        Column::new("Subject".into(), ["S1", "S2"]),
        Column::new("Folder".into(), ["SCREEN", "SCREEN"]),
        Column::new("Q1".into(), ["a", "d"]),
        Column::new("Q2".into(), ["b", "e"]),
        Column::new("Q3".into(), ["c", "f"]),
    ])
    .unwrap();
    DomainExtract::new("sm_ae201", df)
}

#[test]
fn two_subjects_three_items_stage_six_records() {
    let config = config();
    let dims = DimensionMap::new();
    let ctx = RunContext::new(&config, &dims).with_started_at(started());
    let mut gateway = MemoryGateway::new();
    let mut report = RunReport::new();

    let summary = run_pipeline(&extracts(vec![ae_extract()]), &ctx, &mut gateway, &mut report)
        .unwrap();

    let domain = summary.domain("sm_ae201").unwrap();
    assert_eq!(domain.status, DomainStatus::Staged);
    assert_eq!(domain.domain_name.as_deref(), Some("AE"));
    assert_eq!(domain.records, 6);
    assert_eq!(domain.subjects, 2);
    assert_eq!(domain.active, 6);

    let active = gateway.rows(StageTable::Active);
    assert_eq!(active.len(), 6);
    assert_eq!(
        active
            .iter()
            .filter(|row| row.get("subjid") == Some(&StageValue::text("S1")))
            .count(),
        3
    );
    assert!(
        active
            .iter()
            .all(|row| row.get("domain") == Some(&StageValue::text("AE")))
    );
    assert_eq!(report.of_kind(IssueKind::MissingAuditColumn).count(), 1);
    assert!(!report.has_errors());
}

#[test]
fn every_item_of_a_keyed_row_is_staged() {
    let config = config();
    let dims = DimensionMap::new();
    let ctx = RunContext::new(&config, &dims).with_started_at(started());
    let df = DataFrame::new(vec![
        Column::new("Subject".into(), ["S1", "S2"]),
        Column::new("cdr_skey".into(), [42i64, 43]),
        Column::new("ck_event_id".into(), [7i64, 8]),
        Column::new("Q1".into(), ["a", "d"]),
        Column::new("Q2".into(), ["b", "e"]),
        Column::new("Q3".into(), ["c", "f"]),
    ])
    .unwrap();
    let input = extracts(vec![DomainExtract::new("sm_ae201", df)]);
    let mut gateway = MemoryGateway::new();
    let mut report = RunReport::new();

    let summary = run_pipeline(&input, &ctx, &mut gateway, &mut report).unwrap();
    let domain = summary.domain("sm_ae201").unwrap();
    assert_eq!(domain.records, 6);
    assert_eq!(domain.active, 6);
    assert_eq!(domain.replaced, 0);
    assert_eq!(gateway.rows(StageTable::Active).len(), domain.active);
    assert_eq!(
        gateway
            .rows(StageTable::Active)
            .iter()
            .filter(|row| row.get("cdr_skey") == Some(&StageValue::Integer(42)))
            .count(),
        3
    );
    assert_eq!(report.of_kind(IssueKind::DuplicateRecordKey).count(), 0);

    // Re-applying the same batch in a new run overwrites in place.
    let rerun = run_pipeline(&input, &ctx, &mut gateway, &mut RunReport::new()).unwrap();
    assert_eq!(rerun.domain("sm_ae201").unwrap().active, 6);
    assert_eq!(gateway.rows(StageTable::Active).len(), 6);
}

#[test]
fn delete_marker_moves_active_row() {
    let config = config();
    let dims = DimensionMap::new();
    let ctx = RunContext::new(&config, &dims).with_started_at(started());
    let mut gateway = MemoryGateway::with_rows(
        vec![StagedRow::from_pairs([
            ("cdr_skey", StageValue::Integer(42)),
            ("ck_event_id", StageValue::Integer(7)),
            ("item_nm", StageValue::text("Q1")),
        ])],
        Vec::new(),
    );
    let df = DataFrame::new(vec![
        Column::new("Subject".into(), ["S1", "S2"]),
        Column::new("cdr_skey".into(), [42i64, 43]),
        Column::new("ck_event_id".into(), [9i64, 10]),
        Column::new("AUDIT_ACTION".into(), [Some("D"), None]),
        Column::new("Q1".into(), ["x", "y"]),
    ])
    .unwrap();
    let mut report = RunReport::new();

    let summary = run_pipeline(
        &extracts(vec![DomainExtract::new("sm_ae201", df)]),
        &ctx,
        &mut gateway,
        &mut report,
    )
    .unwrap();

    let domain = summary.domain("sm_ae201").unwrap();
    assert_eq!(domain.active, 1);
    assert_eq!(domain.deleted, 1);
    assert_eq!(domain.orphans, 0);

    let active = gateway.rows(StageTable::Active);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].get("cdr_skey"), Some(&StageValue::Integer(43)));

    let deleted = gateway.rows(StageTable::Deleted);
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].get("cdr_skey"), Some(&StageValue::Integer(42)));
    assert_eq!(deleted[0].get("prev_ck_event_id"), Some(&StageValue::Integer(7)));
    assert_eq!(deleted[0].get("status"), Some(&StageValue::text("D")));
    assert!(report.of_kind(IssueKind::MissingAuditColumn).next().is_none());
}

#[test]
fn malformed_label_does_not_stop_other_domains() {
    let config = config();
    let dims = DimensionMap::new();
    let ctx = RunContext::new(&config, &dims).with_started_at(started());
    let mut gateway = MemoryGateway::new();
    let mut report = RunReport::new();
    let broken = DomainExtract::new("ae", ae_extract().data);

    let summary = run_pipeline(
        &extracts(vec![broken, ae_extract()]),
        &ctx,
        &mut gateway,
        &mut report,
    )
    .unwrap();

    assert_eq!(summary.domain("ae").unwrap().status, DomainStatus::Skipped);
    assert_eq!(
        summary.domain("sm_ae201").unwrap().status,
        DomainStatus::Staged
    );
    assert_eq!(report.of_kind(IssueKind::MalformedDomainLabel).count(), 1);
}

#[test]
fn cancelled_run_stops_before_staging() {
    let config = config();
    let dims = DimensionMap::new();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let ctx = RunContext::new(&config, &dims)
        .with_started_at(started())
        .with_cancel(cancel);
    let mut gateway = MemoryGateway::new();
    let mut report = RunReport::new();

    let summary = run_pipeline(&extracts(vec![ae_extract()]), &ctx, &mut gateway, &mut report)
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.count_status(DomainStatus::Cancelled), 1);
    assert_eq!(report.of_kind(IssueKind::Cancelled).count(), 1);
    assert!(gateway.rows(StageTable::Active).is_empty());
    assert!(!gateway.in_transaction());
}

#[test]
fn invalid_config_aborts_run() {
    let config = PipelineConfig {
        sample_limit: Some(0),
        ..PipelineConfig::default()
    };
    let dims = DimensionMap::new();
    let ctx = RunContext::new(&config, &dims);
    let result = run_pipeline(
        &BTreeMap::new(),
        &ctx,
        &mut MemoryGateway::new(),
        &mut RunReport::new(),
    );
    assert!(matches!(result, Err(cdr_core::PipelineError::Config(_))));
}

#[test]
fn directory_run_resolves_item_ids() {
    let extract_dir = TempDir::new().unwrap();
    let maps_dir = TempDir::new().unwrap();
    fs::write(
        extract_dir.path().join("sm_ae201.csv"),
        "Subject,Folder,AETERM,AESEV\nS1,SCREEN,Headache,MILD\nS2,WEEK1,Nausea,SEVERE\n",
    )
    .unwrap();
    fs::write(
        maps_dir.path().join("map_item.csv"),
        "item_nm,item_id\nAETERM,101\nAESEV,102\n",
    )
    .unwrap();

    let config = config();
    let extracts = load_extracts(extract_dir.path()).unwrap();
    let dims = load_dimensions(Some(maps_dir.path()), &config).unwrap();
    let ctx = RunContext::new(&config, &dims).with_started_at(started());
    let mut gateway = MemoryGateway::new();
    let mut report = RunReport::new();

    let summary = run_pipeline(&extracts, &ctx, &mut gateway, &mut report).unwrap();
    assert_eq!(summary.total_active(), 4);
    // Items resolve; the form binding has no source column in this extract.
    assert_eq!(summary.domain("sm_ae201").unwrap().unresolved, 4);

    let ids: Vec<_> = gateway
        .rows(StageTable::Active)
        .iter()
        .filter_map(|row| row.get("item_id").cloned())
        .collect();
    assert_eq!(ids.iter().filter(|id| **id == StageValue::Integer(101)).count(), 2);
    assert_eq!(ids.iter().filter(|id| **id == StageValue::Integer(102)).count(), 2);
    assert!(gateway.commit().is_err());
}
