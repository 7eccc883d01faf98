//! Extract discovery for export folders.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cdr_model::DomainExtract;

use crate::csv::read_extract;
use crate::error::{IngestError, Result};

/// Prefix of dimension map files, which are never treated as extracts.
const MAP_FILE_PREFIX: &str = "map_";

/// An extract file found in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredExtract {
    /// Raw domain label taken from the file stem, e.g. `sm_ae201`.
    pub label: String,
    pub path: PathBuf,
}

/// Lists all CSV files in a directory.
///
/// Returns files sorted by filename.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();

    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        if is_csv {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(files)
}

/// Finds the extract files in a directory, skipping dimension maps.
pub fn discover_extracts(dir: &Path) -> Result<Vec<DiscoveredExtract>> {
    let mut discovered = Vec::new();
    for path in list_csv_files(dir)? {
        let label = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::trim)
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| IngestError::InvalidFileName { path: path.clone() })?
            .to_string();
        if label.to_ascii_lowercase().starts_with(MAP_FILE_PREFIX) {
            tracing::debug!(path = %path.display(), "skipping dimension map file");
            continue;
        }
        discovered.push(DiscoveredExtract { label, path });
    }
    Ok(discovered)
}

/// Loads every extract in a directory, keyed by raw domain label.
///
/// Labels that collide are kept once; the file that sorts first wins.
pub fn load_extracts(dir: &Path) -> Result<BTreeMap<String, DomainExtract>> {
    let mut extracts = BTreeMap::new();
    for found in discover_extracts(dir)? {
        if extracts.contains_key(&found.label) {
            tracing::warn!(
                label = %found.label,
                path = %found.path.display(),
                "duplicate domain label, file ignored"
            );
            continue;
        }
        let data = read_extract(&found.path)?;
        extracts.insert(found.label.clone(), DomainExtract::new(found.label, data));
    }
    tracing::info!(dir = %dir.display(), extracts = extracts.len(), "loaded extracts");
    Ok(extracts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in &["sm_dm.csv", "sm_ae201.csv", "map_item.csv"] {
            std::fs::write(dir.path().join(name), "Subject,Q1\n001,x\n").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        dir
    }

    #[test]
    fn test_list_csv_files() {
        let dir = create_test_dir();
        let files = list_csv_files(dir.path()).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("map_item.csv"));
    }

    #[test]
    fn test_discover_skips_maps() {
        let dir = create_test_dir();
        let found = discover_extracts(dir.path()).unwrap();
        let labels: Vec<_> = found.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["sm_ae201", "sm_dm"]);
    }

    #[test]
    fn test_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("sm_ae.csv");
        std::fs::write(&file_path, "Subject\n").unwrap();
        assert!(matches!(
            list_csv_files(&file_path),
            Err(IngestError::DirectoryNotFound { .. })
        ));
    }
}
