//! Machine-readable run output and domain listings.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use cdr_core::RunSummary;
use cdr_model::{DomainExtract, PipelineConfig, RunReport};
use cdr_transform::normalize_domain_label;

/// How one extract would be treated by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainListing {
    pub label: String,
    /// `None` when the label is malformed.
    pub domain_name: Option<String>,
    /// `None` when no configuration was given.
    pub needed: Option<bool>,
    pub rows: usize,
    pub columns: usize,
}

pub fn list_domains(
    extracts: &BTreeMap<String, DomainExtract>,
    config: Option<&PipelineConfig>,
) -> Vec<DomainListing> {
    extracts
        .iter()
        .map(|(label, extract)| {
            let domain_name = normalize_domain_label(label).ok();
            let needed = match (config, domain_name.as_deref()) {
                (Some(config), Some(name)) => Some(config.is_needed(name)),
                (Some(_), None) => Some(false),
                (None, _) => None,
            };
            DomainListing {
                label: label.clone(),
                domain_name,
                needed,
                rows: extract.row_count(),
                columns: extract.data.width(),
            }
        })
        .collect()
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a RunSummary,
    error_count: usize,
    warning_count: usize,
    issues: &'a RunReport,
}

/// Render the run summary and every issue as pretty JSON.
pub fn render_json_report(summary: &RunSummary, report: &RunReport) -> Result<String> {
    let json = JsonReport {
        summary,
        error_count: report.error_count(),
        warning_count: report.warning_count(),
        issues: report,
    };
    serde_json::to_string_pretty(&json).context("serialize run report")
}

pub fn write_json_report(path: &Path, summary: &RunSummary, report: &RunReport) -> Result<()> {
    let json = render_json_report(summary, report)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report directory {}", parent.display()))?;
    }
    fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote run report");
    Ok(())
}
