//! Loading a full export directory.

use cdr_ingest::{CsvDimensionProvider, load_extracts};
use cdr_model::{DimensionKind, DimensionMap};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) {
    std::fs::write(dir.path().join(name), content).unwrap();
}

#[test]
fn loads_extracts_keyed_by_label() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "sm_ae201.csv",
        "Subject,Folder,Q1,Q2\n001,SCREEN,a,b\n002,SCREEN,c,\n",
    );
    write(&dir, "sm_dm.csv", "Subject,SEX\n001,F\n");
    write(&dir, "map_item.csv", "item_nm,item_id\nQ1,1\n");

    let extracts = load_extracts(dir.path()).unwrap();
    let labels: Vec<_> = extracts.keys().cloned().collect();
    assert_eq!(labels, vec!["sm_ae201", "sm_dm"]);

    let ae = &extracts["sm_ae201"];
    assert_eq!(ae.domain_label, "sm_ae201");
    assert_eq!(ae.row_count(), 2);
    assert!(ae.has_column("Q2"));
}

#[test]
fn builds_dimension_map_from_csv_dir() {
    let dir = TempDir::new().unwrap();
    write(&dir, "map_item.csv", "item_nm,item_id\nAETERM,11\nAESEV,12\n");
    write(&dir, "map_form.csv", "form_nm,form_id\nAdverse Events,3\n");

    let provider = CsvDimensionProvider::new(dir.path());
    let dims = DimensionMap::load(
        &provider,
        [DimensionKind::Item, DimensionKind::Form, DimensionKind::Site],
    )
    .unwrap();

    assert_eq!(dims.resolve(DimensionKind::Item, "AESEV"), Some(12));
    assert_eq!(dims.resolve(DimensionKind::Form, "ADVERSE EVENTS"), Some(3));
    assert!(dims.contains(DimensionKind::Site));
    assert_eq!(dims.len(DimensionKind::Site), 0);
}
