//! Per-domain and per-run outcome counters.

use serde::Serialize;

/// How far a domain got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    /// Records were routed to the staging tables.
    Staged,
    /// A precondition failed; the reason is in the issues.
    Skipped,
    /// An unexpected error aborted the domain.
    Failed,
    /// The run was cancelled while this domain was in flight.
    Cancelled,
}

impl DomainStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staged => "staged",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainSummary {
    /// Raw domain label.
    pub label: String,
    /// Canonical domain name, when the label could be normalized.
    pub domain_name: Option<String>,
    pub status: DomainStatus,
    pub source_rows: usize,
    pub subjects: usize,
    /// Long records produced by unflattening.
    pub records: usize,
    /// Rows written to the active table under a new record key.
    pub active: usize,
    /// Active rows that overwrote a record staged earlier in the run.
    pub replaced: usize,
    /// Dimension keys that fell back to the sentinel id, over all bindings.
    pub unresolved: usize,
    /// Rows written to the deletion table.
    pub deleted: usize,
    pub orphans: usize,
    /// Records lost to persistence failures.
    pub failures: usize,
}

impl DomainSummary {
    pub fn new(label: impl Into<String>, status: DomainStatus) -> Self {
        Self {
            label: label.into(),
            domain_name: None,
            status,
            source_rows: 0,
            subjects: 0,
            records: 0,
            active: 0,
            replaced: 0,
            unresolved: 0,
            deleted: 0,
            orphans: 0,
            failures: 0,
        }
    }
}

/// Outcome of one run over a set of extracts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Run start, rendered with the staging timestamp format.
    pub started_at: String,
    pub domains: Vec<DomainSummary>,
    /// True when the run stopped early on cancellation.
    pub cancelled: bool,
}

impl RunSummary {
    pub fn count_status(&self, status: DomainStatus) -> usize {
        self.domains
            .iter()
            .filter(|domain| domain.status == status)
            .count()
    }

    pub fn total_records(&self) -> usize {
        self.domains.iter().map(|domain| domain.records).sum()
    }

    pub fn total_active(&self) -> usize {
        self.domains.iter().map(|domain| domain.active).sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.domains.iter().map(|domain| domain.deleted).sum()
    }

    pub fn domain(&self, label: &str) -> Option<&DomainSummary> {
        self.domains.iter().find(|domain| domain.label == label)
    }
}
