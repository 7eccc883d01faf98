//! Typed pipeline configuration.
//!
//! The configuration is a plain value: it is loaded once (usually from TOML),
//! validated, and then passed by reference to every component. Column names
//! that differ between source EDC systems are resolved through
//! [`SourceSystem`] presets plus explicit overrides, never guessed at the
//! call site.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dimension::DimensionKind;
use crate::error::{ConfigError, Result};

/// Name of the active staging table.
pub const STG_PRED: &str = "stg_pred";
/// Name of the deletion staging table.
pub const STG_PRED_DEL: &str = "stg_pred_del";

/// Source EDC system an extract was exported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSystem {
    /// Medidata Rave clinical views.
    #[default]
    Rave,
    /// Oracle InForm extracts.
    Inform,
}

impl SourceSystem {
    /// Default column names for this system.
    pub fn default_columns(self) -> SourceColumns {
        match self {
            Self::Rave => SourceColumns {
                subject: "Subject".to_string(),
                last_modified: "MaxUpdated".to_string(),
                audit_action: "AUDIT_ACTION".to_string(),
            },
            Self::Inform => SourceColumns {
                subject: "SUBJID".to_string(),
                last_modified: "DCMDATE".to_string(),
                audit_action: "AUDIT_ACTION".to_string(),
            },
        }
    }
}

/// Resolved per-system column aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumns {
    /// Subject identity column.
    pub subject: String,
    /// Last-modified timestamp column.
    pub last_modified: String,
    /// Audit action column carrying the delete marker.
    pub audit_action: String,
}

/// Optional overrides for the [`SourceSystem`] column presets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceColumnOverrides {
    pub subject: Option<String>,
    pub last_modified: Option<String>,
    pub audit_action: Option<String>,
}

/// Ordered target column list for one staging table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageTableConfig {
    pub db_cols: Vec<String>,
}

/// Resolve one column of the long frame against a dimension lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionBinding {
    pub kind: DimensionKind,
    /// Column holding the natural key (after renaming).
    pub source_column: String,
    /// Column receiving the surrogate id.
    pub target_column: String,
}

impl DimensionBinding {
    pub fn new(kind: DimensionKind, source: &str, target: &str) -> Self {
        Self {
            kind,
            source_column: source.to_string(),
            target_column: target.to_string(),
        }
    }
}

/// Duplicate a column under a second name after dimension resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnCopy {
    pub from: String,
    pub to: String,
}

/// Complete configuration for one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Warehouse schema holding the staging tables (usually the study name).
    pub schema: String,
    pub source_system: SourceSystem,
    pub columns: SourceColumnOverrides,
    /// Identifier columns replicated onto every pivoted record.
    pub base_cols: Vec<String>,
    /// Canonical domain names to process; others are skipped.
    pub needed_domains: Vec<String>,
    /// Applied to the long frame right after pivoting.
    pub rename_columns: BTreeMap<String, String>,
    pub stg_pred: StageTableConfig,
    pub stg_pred_del: StageTableConfig,
    /// Maximum rows per domain; larger extracts are randomly sampled.
    pub sample_limit: Option<usize>,
    /// Seed for the sampler; unseeded sampling is not reproducible.
    pub sample_seed: Option<u64>,
    pub delete_marker: String,
    pub identity_column: String,
    /// Columns that, together with the identity column, identify one staged
    /// record. Every item pivoted from a source row shares its identity, so
    /// the question column belongs here.
    pub record_key_columns: Vec<String>,
    pub event_id_column: String,
    pub prev_event_id_column: String,
    pub status_column: String,
    /// Target columns filled with the run timestamp when missing.
    pub timestamp_columns: Vec<String>,
    /// Column parsed from free text into a timestamp.
    pub parse_timestamp_column: Option<String>,
    /// Columns whose NaN/inf/null values become the `"null"` sentinel.
    pub text_normalized_columns: Vec<String>,
    pub dimensions: Vec<DimensionBinding>,
    pub column_copies: Vec<ColumnCopy>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

const DEFAULT_STAGE_COLUMNS: &[&str] = &[
    "cdr_skey",
    "ck_event_id",
    "subjid",
    "siteno",
    "sitemnemonic",
    "visit_nm",
    "formname",
    "formrefname",
    "form_id",
    "form_index",
    "itemset_ix",
    "itemrepn",
    "sectionref_nm",
    "item_nm",
    "item_id",
    "item_value",
    "answer_in_text",
    "domain",
    "modif_dts",
    "created_dt",
];

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut del_cols = strings(DEFAULT_STAGE_COLUMNS);
        del_cols.push("prev_ck_event_id".to_string());
        del_cols.push("status".to_string());
        let rename_columns = [
            ("Subject", "subjid"),
            ("SiteNumber", "siteno"),
            ("Site", "sitemnemonic"),
            ("Folder", "visit_nm"),
            ("DataPageName", "formname"),
            ("PageRepeatNumber", "form_index"),
            ("RecordPosition", "itemset_ix"),
            ("InstanceRepeatNumber", "itemrepn"),
            ("MaxUpdated", "modif_dts"),
            ("QUESTION", "item_nm"),
            ("ANSWER", "item_value"),
            ("DOMAIN", "domain"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
        Self {
            schema: "cdr".to_string(),
            source_system: SourceSystem::default(),
            columns: SourceColumnOverrides::default(),
            base_cols: strings(&[
                "projectid",
                "project",
                "studyid",
                "environmentName",
                "subjectId",
                "StudySiteId",
                "Subject",
                "siteid",
                "Site",
                "SiteNumber",
                "SiteGroup",
                "instanceId",
                "InstanceName",
                "InstanceRepeatNumber",
                "folderid",
                "Folder",
                "FolderName",
                "FolderSeq",
                "TargetDays",
                "DataPageId",
                "DataPageName",
                "PageRepeatNumber",
                "RecordDate",
                "RecordId",
                "RecordPosition",
                "MinCreated",
                "MaxUpdated",
                "SaveTs",
                "StudyEnvSiteNumber",
                "cdr_skey",
                "ck_event_id",
            ]),
            needed_domains: Vec::new(),
            rename_columns,
            stg_pred: StageTableConfig {
                db_cols: strings(DEFAULT_STAGE_COLUMNS),
            },
            stg_pred_del: StageTableConfig { db_cols: del_cols },
            sample_limit: None,
            sample_seed: None,
            delete_marker: "D".to_string(),
            identity_column: "cdr_skey".to_string(),
            record_key_columns: strings(&["item_nm"]),
            event_id_column: "ck_event_id".to_string(),
            prev_event_id_column: "prev_ck_event_id".to_string(),
            status_column: "status".to_string(),
            timestamp_columns: strings(&["modif_dts"]),
            parse_timestamp_column: Some("modif_dts".to_string()),
            text_normalized_columns: strings(&[
                "form_ix",
                "itemset_ix",
                "form_index",
                "itemrepn",
                "subjid",
                "siteno",
                "sitemnemonic",
                "item_value",
                "answer_in_text",
                "sectionref_nm",
            ]),
            dimensions: vec![
                DimensionBinding::new(DimensionKind::Item, "item_nm", "item_id"),
                DimensionBinding::new(DimensionKind::Form, "formname", "form_id"),
            ],
            column_copies: vec![
                ColumnCopy {
                    from: "formname".to_string(),
                    to: "formrefname".to_string(),
                },
                ColumnCopy {
                    from: "item_value".to_string(),
                    to: "answer_in_text".to_string(),
                },
            ],
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Column aliases for the configured source system, with overrides applied.
    pub fn source_columns(&self) -> SourceColumns {
        let mut columns = self.source_system.default_columns();
        if let Some(subject) = &self.columns.subject {
            columns.subject = subject.clone();
        }
        if let Some(last_modified) = &self.columns.last_modified {
            columns.last_modified = last_modified.clone();
        }
        if let Some(audit_action) = &self.columns.audit_action {
            columns.audit_action = audit_action.clone();
        }
        columns
    }

    /// Whether a canonical domain name is on the allow-list.
    pub fn is_needed(&self, domain_name: &str) -> bool {
        self.needed_domains
            .iter()
            .any(|needed| needed.trim().eq_ignore_ascii_case(domain_name))
    }

    /// Name a source column carries after `rename_columns` is applied.
    pub fn renamed<'a>(&'a self, column: &'a str) -> &'a str {
        self.rename_columns
            .get(column)
            .map_or(column, String::as_str)
    }

    /// Upsert conflict key: the identity column followed by the record key.
    pub fn upsert_key_columns(&self) -> Vec<String> {
        std::iter::once(&self.identity_column)
            .chain(&self.record_key_columns)
            .cloned()
            .collect()
    }

    /// Whether a target column is filled with the run timestamp when missing.
    pub fn is_timestamp_column(&self, column: &str) -> bool {
        self.timestamp_columns.iter().any(|name| name == column)
    }

    /// Check the configuration contract.
    ///
    /// Violations here are fatal to the run, unlike anything found in the data.
    pub fn validate(&self) -> Result<()> {
        if self.base_cols.iter().all(|col| col.trim().is_empty()) {
            return Err(ConfigError::EmptyBaseColumns);
        }
        if self.sample_limit == Some(0) {
            return Err(ConfigError::ZeroSampleLimit);
        }
        validate_columns(STG_PRED, &self.stg_pred.db_cols)?;
        validate_columns(STG_PRED_DEL, &self.stg_pred_del.db_cols)?;

        let required = [
            (STG_PRED, &self.stg_pred, &self.identity_column, "identity"),
            (STG_PRED, &self.stg_pred, &self.event_id_column, "event id"),
            (
                STG_PRED_DEL,
                &self.stg_pred_del,
                &self.identity_column,
                "identity",
            ),
            (
                STG_PRED_DEL,
                &self.stg_pred_del,
                &self.prev_event_id_column,
                "previous event id",
            ),
            (STG_PRED_DEL, &self.stg_pred_del, &self.status_column, "status"),
        ];
        let record_keys = self
            .record_key_columns
            .iter()
            .flat_map(|column| {
                [
                    (STG_PRED, &self.stg_pred, column, "record key"),
                    (STG_PRED_DEL, &self.stg_pred_del, column, "record key"),
                ]
            });
        for (table, target, column, role) in required.into_iter().chain(record_keys) {
            if !target.db_cols.iter().any(|name| name == column) {
                return Err(ConfigError::MissingColumn {
                    table: table.to_string(),
                    column: column.clone(),
                    role,
                });
            }
        }
        Ok(())
    }
}

fn validate_columns(table: &str, columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        return Err(ConfigError::EmptyColumnList {
            table: table.to_string(),
        });
    }
    let mut seen = BTreeSet::new();
    for column in columns {
        if column.trim().is_empty() {
            return Err(ConfigError::BlankColumnName {
                table: table.to_string(),
            });
        }
        if !seen.insert(column.as_str()) {
            return Err(ConfigError::DuplicateColumn {
                table: table.to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = PipelineConfig::from_toml_str(&content)?;
    tracing::info!(path = %path.display(), schema = %config.schema, "loaded pipeline config");
    Ok(config)
}
