//! Audit routing: active upserts and deletion moves.
//!
//! Active records are upserted on their record key, the identity column plus
//! the configured record key columns, since every item pivoted from one
//! source row shares that row's identity.
//!
//! Records flagged with the delete marker supersede the active staged rows
//! that have the same identity key. The move (insert into the deletion table
//! carrying the previous event id, then delete from the active table) runs in
//! one transaction per key, so a key is always in exactly one table.

use std::collections::{HashMap, HashSet};

use polars::prelude::*;

use cdr_common::any_to_text;
use cdr_model::{
    EventStatus, IdentityKey, Issue, IssueKind, IssueSink, PipelineConfig, StageTable, StageValue,
    StagedEvent, StagedRow,
};

use crate::gateway::{GatewayError, StagingGateway};
use crate::statement::Statement;

/// A long frame split by audit action.
#[derive(Debug, Clone)]
pub struct AuditPartition {
    pub active: DataFrame,
    pub deleted: DataFrame,
    /// False when the frame had no audit column and everything is active.
    pub audit_column_present: bool,
}

/// Split rows on the audit column; the column itself is dropped.
///
/// A row is deleted when its trimmed audit value equals `delete_marker`,
/// ignoring case. Nulls and any other value are active.
pub fn partition_frame(
    frame: &DataFrame,
    audit_column: &str,
    delete_marker: &str,
) -> PolarsResult<AuditPartition> {
    let Ok(audit) = frame.column(audit_column) else {
        return Ok(AuditPartition {
            active: frame.clone(),
            deleted: frame.clear(),
            audit_column_present: false,
        });
    };

    let marker = delete_marker.trim();
    let deleted_mask = (0..frame.height())
        .map(|idx| {
            audit.get(idx).map(|value| {
                any_to_text(value).is_some_and(|text| text.trim().eq_ignore_ascii_case(marker))
            })
        })
        .collect::<PolarsResult<Vec<bool>>>()?;
    let active_mask: Vec<bool> = deleted_mask.iter().map(|deleted| !deleted).collect();

    let deleted = frame
        .filter(&BooleanChunked::from_slice("deleted".into(), &deleted_mask))?
        .drop(audit_column)?;
    let active = frame
        .filter(&BooleanChunked::from_slice("active".into(), &active_mask))?
        .drop(audit_column)?;
    Ok(AuditPartition {
        active,
        deleted,
        audit_column_present: true,
    })
}

/// Counters for one routed stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    /// Active rows written under a record key not yet written this run.
    pub upserted: usize,
    /// Active rows that replaced a record written earlier in the same run.
    pub replaced: usize,
    /// Rows written to the deletion table.
    pub moved: usize,
    /// Active rows removed by deletion moves.
    pub superseded: u64,
    /// Deletion records with no active row to supersede.
    pub orphaned: usize,
    /// Records lost to write or transaction failures.
    pub failed: usize,
}

impl RouteStats {
    pub fn merge(&mut self, other: RouteStats) {
        self.upserted += other.upserted;
        self.replaced += other.replaced;
        self.moved += other.moved;
        self.superseded += other.superseded;
        self.orphaned += other.orphaned;
        self.failed += other.failed;
    }
}

enum MoveOutcome {
    Moved { inserted: usize, removed: u64 },
    Orphan,
}

struct DeletionGroup {
    key: IdentityKey,
    value: StageValue,
    events: Vec<StagedEvent>,
}

/// Writes routed records through a [`StagingGateway`].
///
/// One router serves a whole run: record keys already written are
/// remembered so that a later record overwriting one is counted and
/// reported rather than lost silently.
pub struct AuditRouter<'a, G> {
    config: &'a PipelineConfig,
    gateway: G,
    subject_column: String,
    upsert_key: Vec<String>,
    written: HashSet<Vec<IdentityKey>>,
}

impl<'a, G: StagingGateway> AuditRouter<'a, G> {
    pub fn new(config: &'a PipelineConfig, gateway: G) -> Self {
        let subject = config.source_columns().subject;
        Self {
            config,
            gateway,
            subject_column: config.renamed(&subject).to_string(),
            upsert_key: config.upsert_key_columns(),
            written: HashSet::new(),
        }
    }

    /// Column the current domain's subject ids are read from.
    pub fn set_subject_column(&mut self, column: impl Into<String>) {
        self.subject_column = column.into();
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Upsert each active row on its record key (identity plus record key
    /// columns); rows missing any part of the key are plain inserts. Failed
    /// writes are reported and skipped.
    pub fn route_active(
        &mut self,
        rows: Vec<StagedRow>,
        domain_label: &str,
        sink: &mut dyn IssueSink,
    ) -> RouteStats {
        let mut stats = RouteStats::default();
        for row in rows {
            let key = record_key(&row, &self.upsert_key);
            let statement = if key.is_some() {
                Statement::Upsert {
                    table: StageTable::Active,
                    conflict_columns: self.upsert_key.clone(),
                    row,
                }
            } else {
                Statement::Insert {
                    table: StageTable::Active,
                    row,
                }
            };
            match self.gateway.execute(&statement) {
                Ok(_) => {
                    if key.is_none_or(|key| self.written.insert(key)) {
                        stats.upserted += 1;
                    } else {
                        stats.replaced += 1;
                    }
                }
                Err(err) => {
                    stats.failed += 1;
                    self.report_failure(sink, domain_label, statement.row(), &err);
                }
            }
        }
        if stats.replaced > 0 {
            sink.report(
                Issue::new(
                    IssueKind::DuplicateRecordKey,
                    domain_label,
                    format!(
                        "{} records replaced an earlier record with the same ({})",
                        stats.replaced,
                        self.upsert_key.join(", ")
                    ),
                )
                .with_column(self.config.identity_column.as_str())
                .with_count(stats.replaced as u64),
            );
        }
        tracing::debug!(
            domain = %domain_label,
            upserted = stats.upserted,
            replaced = stats.replaced,
            failed = stats.failed,
            "routed active records"
        );
        stats
    }

    /// Move the active rows of every deleted identity into the deletion table.
    pub fn route_deleted(
        &mut self,
        rows: Vec<StagedRow>,
        domain_label: &str,
        sink: &mut dyn IssueSink,
    ) -> RouteStats {
        let mut stats = RouteStats::default();

        // Group by identity in order of first appearance.
        let mut groups: Vec<DeletionGroup> = Vec::new();
        let mut positions: HashMap<IdentityKey, usize> = HashMap::new();
        for row in rows {
            let event = StagedEvent::from_row(
                row,
                &self.config.identity_column,
                &self.config.event_id_column,
                EventStatus::Deleted,
            );
            match event.identity_key.clone() {
                Some(key) => {
                    let slot = *positions.entry(key.clone()).or_insert_with(|| {
                        let value = event
                            .payload
                            .get(&self.config.identity_column)
                            .cloned()
                            .unwrap_or(StageValue::Null);
                        groups.push(DeletionGroup {
                            key,
                            value,
                            events: Vec::new(),
                        });
                        groups.len() - 1
                    });
                    groups[slot].events.push(event);
                }
                None => {
                    stats.orphaned += 1;
                    self.report_orphan(sink, domain_label, &event, "deletion record has no identity key");
                }
            }
        }

        for group in groups {
            match self.move_in_transaction(&group) {
                Ok(MoveOutcome::Moved { inserted, removed }) => {
                    stats.moved += inserted;
                    stats.superseded += removed;
                }
                Ok(MoveOutcome::Orphan) => {
                    stats.orphaned += group.events.len();
                    for event in &group.events {
                        self.report_orphan(
                            sink,
                            domain_label,
                            event,
                            &format!(
                                "no active row with {} {}",
                                self.config.identity_column, group.key
                            ),
                        );
                    }
                }
                Err(err) => {
                    stats.failed += group.events.len();
                    for event in &group.events {
                        self.report_failure(sink, domain_label, Some(&event.payload), &err);
                    }
                }
            }
        }
        tracing::debug!(
            domain = %domain_label,
            moved = stats.moved,
            superseded = stats.superseded,
            orphaned = stats.orphaned,
            failed = stats.failed,
            "routed deletion records"
        );
        stats
    }

    fn move_in_transaction(&mut self, group: &DeletionGroup) -> Result<MoveOutcome, GatewayError> {
        self.gateway.begin()?;
        match self.move_key(group) {
            Ok(MoveOutcome::Moved { inserted, removed }) => match self.gateway.commit() {
                Ok(()) => Ok(MoveOutcome::Moved { inserted, removed }),
                Err(err) => {
                    self.rollback_quietly(&group.key);
                    Err(err)
                }
            },
            Ok(MoveOutcome::Orphan) => {
                self.gateway.rollback()?;
                Ok(MoveOutcome::Orphan)
            }
            Err(err) => {
                self.rollback_quietly(&group.key);
                Err(err)
            }
        }
    }

    /// Each deletion record takes the event id of the active row for the
    /// same record as its previous event. Active rows of the identity that no
    /// deletion record names are carried into the deletion table as they are,
    /// then every active row of the identity is removed.
    fn move_key(&mut self, group: &DeletionGroup) -> Result<MoveOutcome, GatewayError> {
        let identity_column = self.config.identity_column.clone();
        let current = self.gateway.query(&Statement::SelectByIdentity {
            table: StageTable::Active,
            identity_column: identity_column.clone(),
            key: group.value.clone(),
        })?;
        let (Some(first), Some(template)) = (current.first(), group.events.first()) else {
            return Ok(MoveOutcome::Orphan);
        };
        let fallback_event = self.event_id_of(first);

        let mut paired = vec![false; current.len()];
        for event in &group.events {
            let previous = match current
                .iter()
                .position(|active| self.same_record(active, &event.payload))
            {
                Some(idx) => {
                    paired[idx] = true;
                    self.event_id_of(&current[idx])
                }
                None => fallback_event.clone(),
            };
            let mut row = event.payload.clone();
            row.set(&self.config.prev_event_id_column, previous);
            row.set(
                &self.config.status_column,
                StageValue::text(event.status.code()),
            );
            self.gateway.execute(&Statement::Insert {
                table: StageTable::Deleted,
                row,
            })?;
        }

        let columns = template.payload.shared_columns();
        let mut carried = 0;
        for (active, _) in current.iter().zip(&paired).filter(|(_, paired)| !**paired) {
            let mut row = active.project(&columns);
            row.set(&self.config.prev_event_id_column, self.event_id_of(active));
            row.set(&self.config.event_id_column, StageValue::Null);
            row.set(
                &self.config.status_column,
                StageValue::text(EventStatus::Deleted.code()),
            );
            self.gateway.execute(&Statement::Insert {
                table: StageTable::Deleted,
                row,
            })?;
            carried += 1;
        }

        let removed = self.gateway.execute(&Statement::DeleteByIdentity {
            table: StageTable::Active,
            identity_column,
            key: group.value.clone(),
        })?;
        tracing::debug!(
            key = %group.key,
            previous_event = %fallback_event,
            carried,
            "moved identity to deletion table"
        );
        Ok(MoveOutcome::Moved {
            inserted: group.events.len() + carried,
            removed,
        })
    }

    fn event_id_of(&self, row: &StagedRow) -> StageValue {
        row.get(&self.config.event_id_column)
            .cloned()
            .unwrap_or(StageValue::Null)
    }

    fn same_record(&self, active: &StagedRow, deletion: &StagedRow) -> bool {
        self.config
            .record_key_columns
            .iter()
            .all(|column| active.identity(column) == deletion.identity(column))
    }

    fn rollback_quietly(&mut self, key: &IdentityKey) {
        if let Err(err) = self.gateway.rollback() {
            tracing::error!(key = %key, error = %err, "rollback failed");
        }
    }

    fn subject_of(&self, row: &StagedRow) -> Option<String> {
        row.get(&self.subject_column)
            .filter(|value| !value.is_absent())
            .map(StageValue::render)
    }

    fn report_orphan(
        &self,
        sink: &mut dyn IssueSink,
        domain_label: &str,
        event: &StagedEvent,
        message: &str,
    ) {
        let mut issue = Issue::new(IssueKind::OrphanDeletion, domain_label, message)
            .with_column(self.config.identity_column.as_str());
        if let Some(subject) = self.subject_of(&event.payload) {
            issue = issue.with_subject(subject);
        }
        sink.report(issue);
    }

    fn report_failure(
        &self,
        sink: &mut dyn IssueSink,
        domain_label: &str,
        row: Option<&StagedRow>,
        err: &GatewayError,
    ) {
        let mut issue = Issue::new(
            IssueKind::PersistenceWriteFailure,
            domain_label,
            format!("record skipped: {err}"),
        );
        if let Some(subject) = row.and_then(|row| self.subject_of(row)) {
            issue = issue.with_subject(subject);
        }
        sink.report(issue);
    }
}

/// Values of `columns` in `row`; `None` when any of them is absent.
fn record_key(row: &StagedRow, columns: &[String]) -> Option<Vec<IdentityKey>> {
    columns.iter().map(|column| row.identity(column)).collect()
}
