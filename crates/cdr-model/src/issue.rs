//! Non-fatal issues found while processing a run.
//!
//! Every skip or substitution the pipeline makes is recorded as an [`Issue`]
//! with enough context (domain, subject, column) to act on it. Components
//! receive an [`IssueSink`] explicitly instead of writing to a global logger.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

/// What went wrong (or was substituted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Domain label could not be normalized; domain skipped.
    MalformedDomainLabel,
    /// A required column (subject identity) is absent; domain skipped.
    MissingRequiredColumn,
    /// Extract has no rows; domain skipped.
    EmptyExtract,
    /// Normalized domain is not on the allow-list; domain skipped.
    DomainNotInAllowList,
    /// Every column is a base column, nothing to pivot; domain skipped.
    NoItemColumns,
    /// Rows with a blank subject identity were dropped before pivoting.
    MissingSubjectId,
    /// No audit-action column; every row treated as active.
    MissingAuditColumn,
    /// Last-modified column could not be stringified before pivoting.
    UnreadableLastModified,
    /// Timestamp text could not be parsed; sentinel date substituted.
    UnparseableTimestamp,
    /// Natural key missing from a dimension lookup; sentinel id substituted.
    UnresolvedDimensionKey,
    /// Two records of one run share a record key; the later one replaced the
    /// earlier in the active table.
    DuplicateRecordKey,
    /// A staging write failed; the record was skipped.
    PersistenceWriteFailure,
    /// Deletion with no active staged row to supersede.
    OrphanDeletion,
    /// Unexpected failure while transforming a domain; domain skipped.
    DomainFailed,
    /// Run was cancelled before the domain finished.
    Cancelled,
}

impl IssueKind {
    pub fn severity(self) -> IssueSeverity {
        match self {
            Self::DomainNotInAllowList => IssueSeverity::Info,
            Self::MalformedDomainLabel
            | Self::MissingRequiredColumn
            | Self::EmptyExtract
            | Self::NoItemColumns
            | Self::MissingSubjectId
            | Self::MissingAuditColumn
            | Self::UnreadableLastModified
            | Self::UnparseableTimestamp
            | Self::UnresolvedDimensionKey
            | Self::DuplicateRecordKey
            | Self::Cancelled => IssueSeverity::Warning,
            Self::PersistenceWriteFailure | Self::OrphanDeletion | Self::DomainFailed => {
                IssueSeverity::Error
            }
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::MalformedDomainLabel => "malformed_domain_label",
            Self::MissingRequiredColumn => "missing_required_column",
            Self::EmptyExtract => "empty_extract",
            Self::DomainNotInAllowList => "domain_not_in_allow_list",
            Self::NoItemColumns => "no_item_columns",
            Self::MissingSubjectId => "missing_subject_id",
            Self::MissingAuditColumn => "missing_audit_column",
            Self::UnreadableLastModified => "unreadable_last_modified",
            Self::UnparseableTimestamp => "unparseable_timestamp",
            Self::UnresolvedDimensionKey => "unresolved_dimension_key",
            Self::DuplicateRecordKey => "duplicate_record_key",
            Self::PersistenceWriteFailure => "persistence_write_failure",
            Self::OrphanDeletion => "orphan_deletion",
            Self::DomainFailed => "domain_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A reported skip, substitution or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    /// Raw domain label the issue belongs to.
    pub domain: String,
    pub subject: Option<String>,
    pub column: Option<String>,
    pub message: String,
    /// Number of occurrences folded into this issue.
    pub count: Option<u64>,
}

impl Issue {
    pub fn new(kind: IssueKind, domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            domain: domain.into(),
            subject: None,
            column: None,
            message: message.into(),
            count: None,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

/// Receiver for issues raised by the pipeline components.
pub trait IssueSink {
    fn report(&mut self, issue: Issue);
}

impl IssueSink for Vec<Issue> {
    fn report(&mut self, issue: Issue) {
        self.push(issue);
    }
}

/// Collects every issue of a run and mirrors it to `tracing`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub issues: Vec<Issue>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_count(&self) -> usize {
        self.count_severity(IssueSeverity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count_severity(IssueSeverity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Issues of one kind.
    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    /// Issues raised for one raw domain label.
    pub fn for_domain<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a Issue> {
        self.issues.iter().filter(move |issue| issue.domain == domain)
    }

    fn count_severity(&self, severity: IssueSeverity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }
}

impl IssueSink for RunReport {
    fn report(&mut self, issue: Issue) {
        let subject = cdr_common::redact_value(issue.subject.as_deref().unwrap_or(""));
        let column = issue.column.as_deref().unwrap_or("");
        match issue.severity {
            IssueSeverity::Info => tracing::info!(
                kind = %issue.kind,
                domain = %issue.domain,
                subject,
                column,
                count = issue.count,
                "{}",
                issue.message
            ),
            IssueSeverity::Warning => tracing::warn!(
                kind = %issue.kind,
                domain = %issue.domain,
                subject,
                column,
                count = issue.count,
                "{}",
                issue.message
            ),
            IssueSeverity::Error => tracing::error!(
                kind = %issue.kind,
                domain = %issue.domain,
                subject,
                column,
                count = issue.count,
                "{}",
                issue.message
            ),
        }
        self.issues.push(issue);
    }
}
