use std::path::PathBuf;

use cdr_core::RunSummary;
use cdr_model::RunReport;

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub report: RunReport,
    /// Staging table files, unless the run was a dry run.
    pub staged_files: Vec<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub dry_run: bool,
}

impl RunOutcome {
    pub fn has_errors(&self) -> bool {
        self.report.has_errors()
    }
}
